//! Audit log persisted to the `audit_logs` table.

use async_trait::async_trait;
use chrono::Utc;
use parcela_core::ports::{AuditError, AuditLog, AuditRecord};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::entities::audit_logs;

/// Writes audit records outside the lifecycle transaction.
#[derive(Debug, Clone)]
pub struct PgAuditLog {
    db: DatabaseConnection,
}

impl PgAuditLog {
    /// Creates a new audit log writer.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn log(&self, record: AuditRecord) -> Result<(), AuditError> {
        let row = audit_logs::ActiveModel {
            id: Set(Uuid::now_v7()),
            actor_id: Set(record.actor_id.into_inner()),
            action: Set(record.action.to_string()),
            entity: Set(record.entity.to_string()),
            entity_id: Set(record.entity_id),
            details: Set(record.details),
            created_at: Set(Utc::now().into()),
        };
        row.insert(&self.db)
            .await
            .map_err(|e| AuditError(e.to_string()))?;
        Ok(())
    }
}
