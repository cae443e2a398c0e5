//! Payment domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use parcela_shared::types::{ContractId, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Scheduled, nothing received yet.
    Pending,
    /// A receipt was uploaded and awaits review.
    Submitted,
    /// Funds were received and posted to the ledger.
    Paid,
    /// The submitted receipt was turned down.
    Rejected,
    /// The submitted receipt does not match and must be corrected.
    Readjustment,
}

impl PaymentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
            Self::Readjustment => "readjustment",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "paid" => Some(Self::Paid),
            "rejected" => Some(Self::Rejected),
            "readjustment" => Some(Self::Readjustment),
            _ => None,
        }
    }

    /// Returns true while the payment is still owed and its amount may change.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Submitted)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Holds the lot.
    Reservation,
    /// Up-front share of the price.
    DownPayment,
    /// A regular monthly share of the financed remainder.
    Installment,
    /// The whole financed remainder at once.
    Full,
    /// Paid ahead of schedule.
    Advance,
    /// Applied straight to principal, with no due payment attached.
    CapitalRepayment,
}

impl PaymentType {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reservation => "reservation",
            Self::DownPayment => "down_payment",
            Self::Installment => "installment",
            Self::Full => "full",
            Self::Advance => "advance",
            Self::CapitalRepayment => "capital_repayment",
        }
    }

    /// Parses a payment type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reservation" => Some(Self::Reservation),
            "down_payment" => Some(Self::DownPayment),
            "installment" => Some(Self::Installment),
            "full" => Some(Self::Full),
            "advance" => Some(Self::Advance),
            "capital_repayment" => Some(Self::CapitalRepayment),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scheduled or received payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,
    /// The contract being paid.
    pub contract_id: ContractId,
    /// Scheduled principal due. Only changes while the payment is open.
    pub amount: Decimal,
    /// Funds received. Set only once paid.
    pub paid_amount: Option<Decimal>,
    /// Overdue interest charged on this payment.
    pub interest_amount: Option<Decimal>,
    /// When the payment is due.
    pub due_date: DateTime<Utc>,
    /// When the funds were received.
    pub payment_date: Option<DateTime<Utc>>,
    /// Current status.
    pub status: PaymentStatus,
    /// What the payment is for.
    pub payment_type: PaymentType,
    /// Reference to the uploaded receipt.
    pub receipt_ref: Option<String>,
    /// Free-form annotations (reallocations, readjustment requests).
    pub notes: Option<String>,
}

impl Payment {
    /// Creates a `pending` payment.
    #[must_use]
    pub fn scheduled(
        contract_id: ContractId,
        payment_type: PaymentType,
        amount: Decimal,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            contract_id,
            amount,
            paid_amount: None,
            interest_amount: None,
            due_date,
            payment_date: None,
            status: PaymentStatus::Pending,
            payment_type,
            receipt_ref: None,
            notes: None,
        }
    }

    /// Principal plus any interest charged: what settles this payment exactly.
    #[must_use]
    pub fn expected(&self) -> Decimal {
        self.amount + self.interest_amount.unwrap_or(Decimal::ZERO)
    }

    /// Appends a line to the payment's notes.
    pub fn annotate(&mut self, note: impl AsRef<str>) {
        match &mut self.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(note.as_ref());
            }
            None => self.notes = Some(note.as_ref().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_expected_includes_interest() {
        let mut p = Payment::scheduled(
            ContractId::new(),
            PaymentType::Installment,
            dec!(1000),
            Utc::now(),
        );
        assert_eq!(p.expected(), dec!(1000));
        p.interest_amount = Some(dec!(9.86));
        assert_eq!(p.expected(), dec!(1009.86));
    }

    #[test]
    fn test_annotate_appends_lines() {
        let mut p = Payment::scheduled(
            ContractId::new(),
            PaymentType::Installment,
            dec!(1000),
            Utc::now(),
        );
        p.annotate("first");
        p.annotate("second");
        assert_eq!(p.notes.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_type_and_status_parse() {
        assert_eq!(
            PaymentType::parse("capital_repayment"),
            Some(PaymentType::CapitalRepayment)
        );
        assert_eq!(PaymentType::parse("down_payment"), Some(PaymentType::DownPayment));
        assert_eq!(PaymentStatus::parse("READJUSTMENT"), Some(PaymentStatus::Readjustment));
        assert!(PaymentStatus::Submitted.is_open());
        assert!(!PaymentStatus::Paid.is_open());
    }
}
