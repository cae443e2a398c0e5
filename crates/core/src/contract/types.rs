//! Contract domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use parcela_shared::types::{ContractId, LotId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::schedule::ScheduleTerms;

/// Longest financing term accepted, in months.
pub const MAX_TERM_MONTHS: u32 = 600;

/// Contract status.
///
/// Legal transitions are listed in [`super::machine::ContractMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    /// Created, awaiting review. No ledger activity.
    Pending,
    /// Documents submitted, awaiting review.
    Submitted,
    /// Approved and being paid off.
    Approved,
    /// Turned down by an administrator.
    Rejected,
    /// Withdrawn; ledger purged and lot released.
    Cancelled,
    /// Fully paid.
    Closed,
}

impl ContractStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the sale is financed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancingType {
    /// The developer finances the lot directly.
    Direct,
    /// A bank finances the balance after the down payment.
    Bank,
}

impl FinancingType {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Bank => "bank",
        }
    }

    /// Parses a financing type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "bank" => Some(Self::Bank),
            _ => None,
        }
    }
}

/// Sale status of the lot a contract is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotStatus {
    /// Free to be sold.
    Available,
    /// Held by an approved contract.
    Reserved,
    /// Fully paid.
    Paid,
}

impl LotStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Paid => "paid",
        }
    }

    /// Parses a lot status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(Self::Available),
            "reserved" => Some(Self::Reserved),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// An installment-sale financing contract for one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Unique identifier.
    pub id: ContractId,
    /// The lot being sold.
    pub lot_id: LotId,
    /// The buyer.
    pub applicant_id: UserId,
    /// Principal financed. Immutable once approved.
    pub amount: Decimal,
    /// Down payment portion of `amount`.
    pub down_payment: Decimal,
    /// Reservation portion of `amount`.
    pub reserve_amount: Decimal,
    /// Number of monthly installments (0 = single full payment).
    pub payment_term_months: u32,
    /// How the sale is financed.
    pub financing_type: FinancingType,
    /// Current status.
    pub status: ContractStatus,
    /// Cached ledger balance. Always recomputed from entries.
    pub balance: Decimal,
    /// Reason given when rejected.
    pub rejection_reason: Option<String>,
    /// Note given when cancelled.
    pub cancellation_note: Option<String>,
    /// When the contract was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// When the contract was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// When the contract was created.
    pub created_at: DateTime<Utc>,
    /// When the contract was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Creates a `pending` contract from validated input.
    pub fn create(input: CreateContractInput, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        input.validate()?;
        Ok(Self {
            id: ContractId::new(),
            lot_id: input.lot_id,
            applicant_id: input.applicant_id,
            amount: input.amount,
            down_payment: input.down_payment,
            reserve_amount: input.reserve_amount,
            payment_term_months: input.payment_term_months,
            financing_type: input.financing_type,
            status: ContractStatus::Pending,
            balance: Decimal::ZERO,
            rejection_reason: None,
            cancellation_note: None,
            approved_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The terms the payment schedule is generated from.
    #[must_use]
    pub fn schedule_terms(&self) -> ScheduleTerms {
        ScheduleTerms {
            amount: self.amount,
            down_payment: self.down_payment,
            reserve_amount: self.reserve_amount,
            payment_term_months: self.payment_term_months,
        }
    }

    /// Returns true once nothing is owed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.balance >= Decimal::ZERO
    }
}

/// Input for creating a contract.
#[derive(Debug, Clone)]
pub struct CreateContractInput {
    /// The lot being sold.
    pub lot_id: LotId,
    /// The buyer.
    pub applicant_id: UserId,
    /// Principal financed.
    pub amount: Decimal,
    /// Down payment portion.
    pub down_payment: Decimal,
    /// Reservation portion.
    pub reserve_amount: Decimal,
    /// Number of monthly installments.
    pub payment_term_months: u32,
    /// How the sale is financed.
    pub financing_type: FinancingType,
}

impl CreateContractInput {
    /// Checks amounts and term.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.amount <= Decimal::ZERO {
            return Err(LifecycleError::validation("Contract amount must be positive"));
        }
        if self.down_payment < Decimal::ZERO {
            return Err(LifecycleError::validation("Down payment cannot be negative"));
        }
        if self.reserve_amount < Decimal::ZERO {
            return Err(LifecycleError::validation("Reserve amount cannot be negative"));
        }
        if self.down_payment + self.reserve_amount > self.amount {
            return Err(LifecycleError::validation(format!(
                "Down payment {} plus reserve {} exceeds contract amount {}",
                self.down_payment, self.reserve_amount, self.amount
            )));
        }
        if self.payment_term_months > MAX_TERM_MONTHS {
            return Err(LifecycleError::validation(format!(
                "Payment term cannot exceed {MAX_TERM_MONTHS} months"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn input(amount: Decimal, down: Decimal, reserve: Decimal, term: u32) -> CreateContractInput {
        CreateContractInput {
            lot_id: LotId::new(),
            applicant_id: UserId::new(),
            amount,
            down_payment: down,
            reserve_amount: reserve,
            payment_term_months: term,
            financing_type: FinancingType::Direct,
        }
    }

    #[test]
    fn test_create_starts_pending_with_zero_balance() {
        let contract =
            Contract::create(input(dec!(12000), dec!(2000), dec!(0), 10), Utc::now()).unwrap();
        assert_eq!(contract.status, ContractStatus::Pending);
        assert_eq!(contract.balance, Decimal::ZERO);
        assert!(contract.approved_at.is_none());
    }

    #[rstest]
    #[case(dec!(0), dec!(0), dec!(0), 10)]
    #[case(dec!(-5), dec!(0), dec!(0), 10)]
    #[case(dec!(1000), dec!(-1), dec!(0), 10)]
    #[case(dec!(1000), dec!(0), dec!(-1), 10)]
    #[case(dec!(1000), dec!(600), dec!(500), 10)]
    #[case(dec!(1000), dec!(0), dec!(0), 601)]
    fn test_invalid_input_rejected(
        #[case] amount: Decimal,
        #[case] down: Decimal,
        #[case] reserve: Decimal,
        #[case] term: u32,
    ) {
        assert!(matches!(
            input(amount, down, reserve, term).validate(),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_status_parse_round_trip() {
        for s in [
            ContractStatus::Pending,
            ContractStatus::Submitted,
            ContractStatus::Approved,
            ContractStatus::Rejected,
            ContractStatus::Cancelled,
            ContractStatus::Closed,
        ] {
            assert_eq!(ContractStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ContractStatus::parse("active"), None);
        assert_eq!(LotStatus::parse("RESERVED"), Some(LotStatus::Reserved));
        assert_eq!(FinancingType::parse("bank"), Some(FinancingType::Bank));
    }
}
