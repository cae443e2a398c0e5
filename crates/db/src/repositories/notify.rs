//! In-app notifications persisted to the `notifications` table.

use async_trait::async_trait;
use chrono::Utc;
use parcela_core::ports::{NotificationKind, Notifier, NotifyError};
use parcela_shared::types::UserId;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::entities::notifications;

fn kind_str(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => "info",
        NotificationKind::Success => "success",
        NotificationKind::Warning => "warning",
    }
}

/// Stores notifications for the web client to pick up.
///
/// Admin broadcasts are a single row with audience `admins`.
#[derive(Debug, Clone)]
pub struct PgNotifier {
    db: DatabaseConnection,
}

impl PgNotifier {
    /// Creates a new notifier.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn store(
        &self,
        user_id: Option<UserId>,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        let audience = if user_id.is_some() { "user" } else { "admins" };
        let row = notifications::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id.map(UserId::into_inner)),
            audience: Set(audience.to_string()),
            title: Set(title.to_string()),
            message: Set(message.to_string()),
            kind: Set(kind_str(kind).to_string()),
            read_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        row.insert(&self.db)
            .await
            .map_err(|e| NotifyError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify_user(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        self.store(Some(user_id), title, message, kind).await
    }

    async fn notify_admins(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        self.store(None, title, message, kind).await
    }
}
