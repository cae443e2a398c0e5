//! Ports to external collaborators.
//!
//! The engine never reaches a database, a mail server, or a task runner
//! directly. Everything it consumes is declared here as a trait and injected
//! into the services that need it, so the ledger and reconciliation logic can
//! be exercised against fakes.

pub mod audit;
pub mod clock;
pub mod notify;
pub mod store;
pub mod tasks;

pub use audit::{AuditError, AuditLog, AuditRecord};
pub use clock::{Clock, FixedClock, SystemClock};
pub use notify::{NotificationKind, Notifier, NotifyError};
pub use store::{LedgerRepository, LedgerTx, StoreError};
pub use tasks::{TaskError, TaskFuture, TaskQueue};
