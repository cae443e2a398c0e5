//! Ledger error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::entry::EntryType;
use crate::ports::StoreError;

/// Errors that can occur while posting to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Entry amount cannot be zero.
    #[error("Entry amount cannot be zero")]
    ZeroAmount,

    /// The amount's sign contradicts the entry type.
    #[error("A {entry_type} entry cannot carry amount {amount}")]
    SignMismatch {
        /// The entry type.
        entry_type: EntryType,
        /// The offending amount.
        amount: Decimal,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::SignMismatch { .. } => "SIGN_MISMATCH",
            Self::Store(_) => "PERSISTENCE_ERROR",
        }
    }
}
