//! Contract lifecycle orchestration.
//!
//! The entry points request handlers and the scheduler call. Each one wires
//! the state machines, the ledger, the schedule generator, and the
//! reconciliation engine together inside a single store transaction.

pub mod service;
pub mod summary;


pub use service::{ApprovePaymentInput, LifecycleDeps, LifecycleService};
pub use summary::ContractSummary;
