//! Append-only contract ledger.
//!
//! This module implements the source of truth for what an applicant owes:
//! - Signed ledger entries (negative = debt increase, positive = reduction)
//! - Balance calculation as a plain sum of entries
//! - Posting with sign validation
//! - The idempotent interest upsert and explicit payment reversals

pub mod balance;
pub mod entry;
pub mod error;
pub mod service;

pub use balance::{ContractBalance, sum_entries};
pub use entry::{Direction, EntryType, LedgerEntry};
pub use error::LedgerError;
pub use service::{LedgerService, UpsertOutcome};
