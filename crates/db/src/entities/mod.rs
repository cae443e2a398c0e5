//! `SeaORM` entity definitions.
//!
//! Enumerated columns (statuses, types) are stored as text and mapped to
//! the core enums in the repository layer.

pub mod applicants;
pub mod audit_logs;
pub mod contracts;
pub mod ledger_entries;
pub mod lots;
pub mod notifications;
pub mod payments;
