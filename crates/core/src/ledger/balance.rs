//! Contract balance calculations.
//!
//! The balance is a materialized view of the ledger: always the plain sum
//! of a contract's signed entries, recomputed after every mutation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::{EntryType, LedgerEntry};

/// Sums signed entry amounts.
#[must_use]
pub fn sum_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Decimal {
    entries.into_iter().map(|e| e.amount).sum()
}

/// Balance of a contract with a per-type breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBalance {
    /// Net balance (sum of all entries). Negative means money is owed.
    pub balance: Decimal,
    /// Sum of negative entries, as a negative number.
    pub total_debits: Decimal,
    /// Sum of positive entries.
    pub total_credits: Decimal,
    /// Principal financed (absolute value of `initial` entries).
    pub principal_financed: Decimal,
    /// Net interest charged (absolute value of `interest` entries).
    pub interest_charged: Decimal,
    /// Net funds received (`payment` + `prepayment` + `adjustment`).
    pub funds_received: Decimal,
}

impl ContractBalance {
    /// Folds a contract's entries into a balance.
    #[must_use]
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut out = Self::default();
        for entry in entries {
            out.balance += entry.amount;
            if entry.amount.is_sign_negative() {
                out.total_debits += entry.amount;
            } else {
                out.total_credits += entry.amount;
            }
            match entry.entry_type {
                EntryType::Initial => out.principal_financed -= entry.amount,
                EntryType::Interest => out.interest_charged -= entry.amount,
                EntryType::Payment | EntryType::Prepayment | EntryType::Adjustment => {
                    out.funds_received += entry.amount;
                }
            }
        }
        out
    }

    /// Returns true once nothing is owed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.balance >= Decimal::ZERO
    }

    /// Amount still owed (zero when settled).
    #[must_use]
    pub fn outstanding(&self) -> Decimal {
        if self.is_settled() {
            Decimal::ZERO
        } else {
            -self.balance
        }
    }
}
