//! Ledger entry domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use parcela_shared::types::{ContractId, LedgerEntryId, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a ledger entry was posted.
///
/// The sign convention is fixed per type: `initial` and `interest` entries
/// increase the debt (negative), `payment` and `prepayment` entries reduce
/// it (positive), and `adjustment` entries may carry either sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// The financed principal, posted once on approval.
    Initial,
    /// Funds applied to a due payment.
    Payment,
    /// Overdue interest charged against a payment.
    Interest,
    /// Funds applied directly to remaining principal.
    Prepayment,
    /// Explicit correction or reversal.
    Adjustment,
}

/// Which sign an entry type must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increases the debt; amount must be negative.
    Debit,
    /// Reduces the debt; amount must be positive.
    Credit,
    /// Either sign.
    Either,
}

impl EntryType {
    /// Returns the string representation of the entry type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Payment => "payment",
            Self::Interest => "interest",
            Self::Prepayment => "prepayment",
            Self::Adjustment => "adjustment",
        }
    }

    /// Parses an entry type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "initial" => Some(Self::Initial),
            "payment" => Some(Self::Payment),
            "interest" => Some(Self::Interest),
            "prepayment" => Some(Self::Prepayment),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }

    /// Returns the sign this entry type must carry.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::Initial | Self::Interest => Direction::Debit,
            Self::Payment | Self::Prepayment => Direction::Credit,
            Self::Adjustment => Direction::Either,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A signed monetary record against a contract.
///
/// Negative amounts increase what the applicant owes, positive amounts
/// reduce it. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for this entry.
    pub id: LedgerEntryId,
    /// The contract this entry belongs to.
    pub contract_id: ContractId,
    /// The payment that produced this entry, if any.
    pub payment_id: Option<PaymentId>,
    /// Signed amount.
    pub amount: Decimal,
    /// Why the entry was posted.
    pub entry_type: EntryType,
    /// Optional description.
    pub description: Option<String>,
    /// When the entry takes effect.
    pub entry_date: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds an entry with a fresh id.
    #[must_use]
    pub fn new(
        contract_id: ContractId,
        payment_id: Option<PaymentId>,
        amount: Decimal,
        entry_type: EntryType,
        description: impl Into<String>,
        entry_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            contract_id,
            payment_id,
            amount,
            entry_type,
            description: Some(description.into()),
            entry_date,
        }
    }

    /// Returns true if the entry increases the debt.
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Returns true if the entry reduces the debt.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entry_type_round_trip() {
        for t in [
            EntryType::Initial,
            EntryType::Payment,
            EntryType::Interest,
            EntryType::Prepayment,
            EntryType::Adjustment,
        ] {
            assert_eq!(EntryType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntryType::parse("PREPAYMENT"), Some(EntryType::Prepayment));
        assert_eq!(EntryType::parse("refund"), None);
    }

    #[test]
    fn test_direction_per_type() {
        assert_eq!(EntryType::Initial.direction(), Direction::Debit);
        assert_eq!(EntryType::Interest.direction(), Direction::Debit);
        assert_eq!(EntryType::Payment.direction(), Direction::Credit);
        assert_eq!(EntryType::Prepayment.direction(), Direction::Credit);
        assert_eq!(EntryType::Adjustment.direction(), Direction::Either);
    }

    #[test]
    fn test_debit_and_credit_flags() {
        let contract_id = ContractId::new();
        let debit = LedgerEntry::new(
            contract_id,
            None,
            dec!(-1000),
            EntryType::Initial,
            "principal",
            Utc::now(),
        );
        assert!(debit.is_debit());
        assert!(!debit.is_credit());

        let credit = LedgerEntry::new(
            contract_id,
            None,
            dec!(250),
            EntryType::Payment,
            "installment",
            Utc::now(),
        );
        assert!(credit.is_credit());
        assert!(!credit.is_debit());
    }
}
