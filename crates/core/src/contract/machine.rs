//! Contract state machine.
//!
//! ```text
//! pending ──submit──▶ submitted
//! {pending, submitted, rejected} ──approve──▶ approved
//! {pending, submitted} ──reject──▶ rejected        (requires a reason)
//! {pending, submitted, rejected} ──cancel──▶ cancelled
//! approved ──close──▶ closed                       (requires balance ≥ 0)
//! closed ──reopen──▶ approved
//! ```

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{Contract, ContractStatus};
use crate::fsm::{Rule, StateMachine};

/// A requested contract status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractTransition {
    /// Applicant submits documents for review.
    Submit,
    /// Administrator approves the financing.
    Approve,
    /// Administrator turns the application down.
    Reject,
    /// The application is withdrawn.
    Cancel,
    /// The contract is fully paid.
    Close,
    /// A closed contract becomes payable again.
    Reopen,
}

impl ContractTransition {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Close => "close",
            Self::Reopen => "reopen",
        }
    }
}

impl fmt::Display for ContractTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn requires_rejection_reason(contract: &Contract) -> Result<(), String> {
    match contract.rejection_reason.as_deref() {
        Some(reason) if !reason.trim().is_empty() => Ok(()),
        _ => Err("a rejection reason is required".to_string()),
    }
}

fn requires_settled_balance(contract: &Contract) -> Result<(), String> {
    if contract.balance >= Decimal::ZERO {
        Ok(())
    } else {
        Err(format!("balance {} is still outstanding", contract.balance))
    }
}

static RULES: &[Rule<ContractMachine>] = &[
    Rule {
        transition: ContractTransition::Submit,
        from: &[ContractStatus::Pending],
        to: ContractStatus::Submitted,
        guard: None,
    },
    Rule {
        transition: ContractTransition::Approve,
        from: &[
            ContractStatus::Pending,
            ContractStatus::Submitted,
            ContractStatus::Rejected,
        ],
        to: ContractStatus::Approved,
        guard: None,
    },
    Rule {
        transition: ContractTransition::Reject,
        from: &[ContractStatus::Pending, ContractStatus::Submitted],
        to: ContractStatus::Rejected,
        guard: Some(requires_rejection_reason),
    },
    Rule {
        transition: ContractTransition::Cancel,
        from: &[
            ContractStatus::Pending,
            ContractStatus::Submitted,
            ContractStatus::Rejected,
        ],
        to: ContractStatus::Cancelled,
        guard: None,
    },
    Rule {
        transition: ContractTransition::Close,
        from: &[ContractStatus::Approved],
        to: ContractStatus::Closed,
        guard: Some(requires_settled_balance),
    },
    Rule {
        transition: ContractTransition::Reopen,
        from: &[ContractStatus::Closed],
        to: ContractStatus::Approved,
        guard: None,
    },
];

/// The contract transition table.
pub struct ContractMachine;

impl StateMachine for ContractMachine {
    type State = ContractStatus;
    type Transition = ContractTransition;
    type Subject = Contract;

    const ENTITY: &'static str = "contract";

    fn rules() -> &'static [Rule<Self>] {
        RULES
    }

    fn state_of(subject: &Contract) -> ContractStatus {
        subject.status
    }
}
