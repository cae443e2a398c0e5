//! Recording fakes for the collaborator ports.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use parcela_shared::types::UserId;

use crate::ports::{
    AuditError, AuditLog, AuditRecord, NotificationKind, Notifier, NotifyError, TaskFuture,
    TaskQueue,
};

/// A notification the fake notifier was asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    /// `None` for admin broadcasts.
    pub user_id: Option<UserId>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, n: SentNotification) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(n);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_user(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        self.push(SentNotification {
            user_id: Some(user_id),
            title: title.to_string(),
            message: message.to_string(),
            kind,
        });
        Ok(())
    }

    async fn notify_admins(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        self.push(SentNotification {
            user_id: None,
            title: title.to_string(),
            message: message.to_string(),
            kind,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
    failing: bool,
}

impl RecordingAudit {
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            failing: true,
        }
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.action)
            .collect()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl AuditLog for RecordingAudit {
    async fn log(&self, record: AuditRecord) -> Result<(), AuditError> {
        if self.failing {
            return Err(AuditError("audit store offline".to_string()));
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

/// Holds queued tasks until [`ManualQueue::run_all`] is awaited.
#[derive(Default)]
pub struct ManualQueue {
    pending: Mutex<Vec<(&'static str, TaskFuture)>>,
    reject: bool,
}

impl ManualQueue {
    /// A queue that drops everything, as a full pool would.
    pub fn rejecting() -> Self {
        Self {
            pending: Mutex::default(),
            reject: true,
        }
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(label, _)| *label)
            .collect()
    }

    /// Runs every queued task, returning how many failed.
    pub async fn run_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        let mut failed = 0;
        for (_, task) in tasks {
            if task.await.is_err() {
                failed += 1;
            }
        }
        failed
    }
}

impl TaskQueue for ManualQueue {
    fn enqueue(&self, label: &'static str, task: TaskFuture) -> bool {
        if self.reject {
            return false;
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((label, task));
        true
    }
}

/// Bundles the fakes a lifecycle test needs.
pub struct Fakes {
    pub notifier: Arc<RecordingNotifier>,
    pub audit: Arc<RecordingAudit>,
    pub queue: Arc<ManualQueue>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            notifier: Arc::new(RecordingNotifier::default()),
            audit: Arc::new(RecordingAudit::default()),
            queue: Arc::new(ManualQueue::default()),
        }
    }
}
