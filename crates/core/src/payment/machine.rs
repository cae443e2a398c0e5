//! Payment state machine.
//!
//! ```text
//! {pending, rejected, readjustment} ──submit──▶ submitted   (requires a receipt)
//! {pending, submitted} ──approve──▶ paid                    (requires a paid amount)
//! submitted ──reject──▶ rejected
//! submitted ──readjust──▶ readjustment
//! paid ──undo──▶ pending
//! ```
//!
//! The machine only decides the next status. Ledger postings and
//! notifications are the caller's job once a transition succeeds.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{Payment, PaymentStatus};
use crate::fsm::{Rule, StateMachine};

/// A requested payment status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentTransition {
    /// A receipt is attached for review.
    Submit,
    /// Funds are confirmed and posted.
    Approve,
    /// The receipt is turned down.
    Reject,
    /// The receipt must be corrected and resubmitted.
    Readjust,
    /// A paid payment is reverted to pending.
    Undo,
}

impl PaymentTransition {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Readjust => "readjust",
            Self::Undo => "undo",
        }
    }
}

impl fmt::Display for PaymentTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn requires_receipt(payment: &Payment) -> Result<(), String> {
    match payment.receipt_ref.as_deref() {
        Some(r) if !r.trim().is_empty() => Ok(()),
        _ => Err("a receipt reference is required".to_string()),
    }
}

fn requires_paid_amount(payment: &Payment) -> Result<(), String> {
    match payment.paid_amount {
        Some(a) if a > Decimal::ZERO => Ok(()),
        Some(a) => Err(format!("paid amount must be positive, got {a}")),
        None => Err("a paid amount is required".to_string()),
    }
}

static RULES: &[Rule<PaymentMachine>] = &[
    Rule {
        transition: PaymentTransition::Submit,
        from: &[
            PaymentStatus::Pending,
            PaymentStatus::Rejected,
            PaymentStatus::Readjustment,
        ],
        to: PaymentStatus::Submitted,
        guard: Some(requires_receipt),
    },
    Rule {
        transition: PaymentTransition::Approve,
        from: &[PaymentStatus::Pending, PaymentStatus::Submitted],
        to: PaymentStatus::Paid,
        guard: Some(requires_paid_amount),
    },
    Rule {
        transition: PaymentTransition::Reject,
        from: &[PaymentStatus::Submitted],
        to: PaymentStatus::Rejected,
        guard: None,
    },
    Rule {
        transition: PaymentTransition::Readjust,
        from: &[PaymentStatus::Submitted],
        to: PaymentStatus::Readjustment,
        guard: None,
    },
    Rule {
        transition: PaymentTransition::Undo,
        from: &[PaymentStatus::Paid],
        to: PaymentStatus::Pending,
        guard: None,
    },
];

/// The payment transition table.
pub struct PaymentMachine;

impl StateMachine for PaymentMachine {
    type State = PaymentStatus;
    type Transition = PaymentTransition;
    type Subject = Payment;

    const ENTITY: &'static str = "payment";

    fn rules() -> &'static [Rule<Self>] {
        RULES
    }

    fn state_of(subject: &Payment) -> PaymentStatus {
        subject.status
    }
}
