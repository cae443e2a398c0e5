//! Audit log port.

use async_trait::async_trait;
use parcela_shared::types::UserId;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// One audit trail record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Who performed the action.
    pub actor_id: UserId,
    /// What was done (`approve`, `capital_repayment`, ...).
    pub action: &'static str,
    /// The entity kind acted upon.
    pub entity: &'static str,
    /// The entity's id.
    pub entity_id: Uuid,
    /// Free-form structured details.
    pub details: serde_json::Value,
}

/// Writing the audit record failed.
#[derive(Debug, Error)]
#[error("Audit log write failed: {0}")]
pub struct AuditError(pub String);

/// Records who did what to which entity.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends a record.
    async fn log(&self, record: AuditRecord) -> Result<(), AuditError>;
}
