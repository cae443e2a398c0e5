//! Read-only contract overview.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::contract::Contract;
use crate::ledger::{ContractBalance, LedgerEntry};
use crate::payment::{Payment, PaymentStatus};

/// Where a contract stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSummary {
    /// The contract, with its cached balance.
    pub contract: Contract,
    /// Balance recomputed from the ledger, with a per-type breakdown.
    pub ledger: ContractBalance,
    /// Payments received.
    pub paid_count: usize,
    /// Payments still owed (pending or submitted).
    pub open_count: usize,
    /// Payments awaiting a corrected receipt (rejected or readjustment).
    pub needs_attention_count: usize,
    /// Principal still scheduled on open payments.
    pub scheduled_principal: Decimal,
    /// Interest charged on open payments.
    pub open_interest: Decimal,
    /// Open payments whose due date has passed.
    pub overdue_count: usize,
    /// The earliest open payment.
    pub next_due: Option<Payment>,
}

impl ContractSummary {
    /// Builds a summary from a consistent read of contract, payments, and entries.
    #[must_use]
    pub fn build(
        contract: Contract,
        payments: &[Payment],
        entries: &[LedgerEntry],
        now: DateTime<Utc>,
    ) -> Self {
        let open: Vec<&Payment> = payments.iter().filter(|p| p.status.is_open()).collect();

        Self {
            ledger: ContractBalance::from_entries(entries),
            paid_count: payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Paid)
                .count(),
            open_count: open.len(),
            needs_attention_count: payments
                .iter()
                .filter(|p| {
                    matches!(p.status, PaymentStatus::Rejected | PaymentStatus::Readjustment)
                })
                .count(),
            scheduled_principal: open.iter().map(|p| p.amount).sum(),
            open_interest: open.iter().filter_map(|p| p.interest_amount).sum(),
            overdue_count: open.iter().filter(|p| p.due_date < now).count(),
            next_due: open.iter().min_by_key(|p| p.due_date).map(|p| (*p).clone()),
            contract,
        }
    }

    /// True when the cached balance matches the ledger.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.contract.balance == self.ledger.balance
    }
}
