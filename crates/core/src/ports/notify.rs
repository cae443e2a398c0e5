//! Notification dispatch port.

use async_trait::async_trait;
use parcela_shared::types::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity/category shown alongside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Neutral information.
    Info,
    /// Something completed successfully.
    Success,
    /// Something needs the recipient's attention.
    Warning,
}

/// Notification delivery failed.
#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers in-app notifications.
///
/// Always invoked from the background worker pool, never inline with a
/// ledger mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifies a single user.
    async fn notify_user(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError>;

    /// Notifies every administrator.
    async fn notify_admins(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError>;
}
