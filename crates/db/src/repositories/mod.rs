//! Repository implementations of the lifecycle engine's ports.
//!
//! Repositories hide the `SeaORM` details from the rest of the application.

pub mod audit;
pub mod notify;
pub mod store;

pub use audit::PgAuditLog;
pub use notify::PgNotifier;
pub use store::{PgStore, PgTx};
