//! Reconciliation engine.
//!
//! Applies received funds to a payment, splits off any excess as a
//! prepayment, and hands the excess to the configured
//! [`ReallocationPolicy`]. Reading the schedule, editing it, and recomputing
//! the balance all happen in the caller's transaction on a locked contract.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use parcela_shared::types::{ContractId, PaymentId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::policy::{ReallocationPlan, ReallocationPolicy, ReallocationStep, ShortenTerm};
use crate::contract::Contract;
use crate::ledger::{EntryType, LedgerEntry, LedgerError, LedgerService};
use crate::payment::{Payment, PaymentType};
use crate::ports::LedgerTx;

/// What a reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    /// Entries posted, in order.
    pub entries: Vec<LedgerEntry>,
    /// What settled the payment exactly (principal plus interest).
    pub expected: Decimal,
    /// Funds beyond `expected` applied to principal.
    pub excess: Decimal,
    /// Schedule edits, when there was excess to reallocate.
    pub plan: Option<ReallocationPlan>,
    /// Contract balance after the pass.
    pub balance: Decimal,
}

impl ReconciliationOutcome {
    /// Returns true if the contract no longer owes anything.
    #[must_use]
    pub fn settled(&self) -> bool {
        self.balance >= Decimal::ZERO
    }
}

/// Applies received funds to the ledger and the remaining schedule.
#[derive(Clone)]
pub struct ReconciliationEngine {
    policy: Arc<dyn ReallocationPolicy>,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(Arc::new(ShortenTerm))
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("policy", &self.policy.name())
            .finish()
    }
}

impl ReconciliationEngine {
    /// Creates an engine with the given reallocation policy.
    #[must_use]
    pub fn new(policy: Arc<dyn ReallocationPolicy>) -> Self {
        Self { policy }
    }

    /// The active reallocation policy.
    #[must_use]
    pub fn policy(&self) -> &dyn ReallocationPolicy {
        self.policy.as_ref()
    }

    /// Applies `received` to `payment`.
    ///
    /// Up to `payment.expected()` is posted as one `payment` credit. Anything
    /// beyond that is posted as a `prepayment` credit on the same payment and
    /// reallocated over the contract's other open installments.
    pub async fn apply_payment<T: LedgerTx>(
        &self,
        tx: &mut T,
        contract: &mut Contract,
        payment: &Payment,
        received: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationOutcome, LedgerError> {
        let expected = payment.expected();
        let excess = received - expected;

        let mut entries = Vec::with_capacity(2);
        let mut plan = None;

        if excess <= Decimal::ZERO {
            entries.push(
                LedgerService::post(
                    tx,
                    LedgerEntry::new(
                        contract.id,
                        Some(payment.id),
                        received,
                        EntryType::Payment,
                        format!("{} payment received", payment.payment_type),
                        now,
                    ),
                )
                .await?,
            );
        } else {
            entries.push(
                LedgerService::post(
                    tx,
                    LedgerEntry::new(
                        contract.id,
                        Some(payment.id),
                        expected,
                        EntryType::Payment,
                        format!("{} payment received", payment.payment_type),
                        now,
                    ),
                )
                .await?,
            );
            entries.push(
                LedgerService::post(
                    tx,
                    LedgerEntry::new(
                        contract.id,
                        Some(payment.id),
                        excess,
                        EntryType::Prepayment,
                        format!("Excess of {excess} applied to principal"),
                        now,
                    ),
                )
                .await?,
            );
            plan = Some(self.reallocate(tx, contract.id, payment.id, excess).await?);
        }

        let balance = LedgerService::refresh_balance(tx, contract).await?;
        debug!(
            contract_id = %contract.id,
            payment_id = %payment.id,
            %received,
            %expected,
            %balance,
            "Payment reconciled"
        );

        Ok(ReconciliationOutcome {
            entries,
            expected,
            excess: excess.max(Decimal::ZERO),
            plan,
            balance,
        })
    }

    /// Applies a direct capital repayment recorded as `payment`.
    ///
    /// There is no due amount to satisfy: the whole amount is posted as one
    /// `prepayment` credit and reallocated.
    pub async fn apply_capital_repayment<T: LedgerTx>(
        &self,
        tx: &mut T,
        contract: &mut Contract,
        payment: &Payment,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationOutcome, LedgerError> {
        let entry = LedgerService::post(
            tx,
            LedgerEntry::new(
                contract.id,
                Some(payment.id),
                amount,
                EntryType::Prepayment,
                format!("Capital repayment of {amount}"),
                now,
            ),
        )
        .await?;
        let plan = self.reallocate(tx, contract.id, payment.id, amount).await?;
        let balance = LedgerService::refresh_balance(tx, contract).await?;

        Ok(ReconciliationOutcome {
            entries: vec![entry],
            expected: Decimal::ZERO,
            excess: amount,
            plan: Some(plan),
            balance,
        })
    }

    /// Plans and applies the reallocation of `excess` coming from `source`.
    async fn reallocate<T: LedgerTx>(
        &self,
        tx: &mut T,
        contract_id: ContractId,
        source: PaymentId,
        excess: Decimal,
    ) -> Result<ReallocationPlan, LedgerError> {
        let mut candidates: Vec<Payment> = tx
            .list_payments(contract_id)
            .await?
            .into_iter()
            .filter(|p| {
                p.id != source && p.payment_type == PaymentType::Installment && p.status.is_open()
            })
            .collect();
        candidates.sort_by_key(|p| p.due_date);

        let plan = self.policy.plan(&candidates, excess);

        for step in &plan.steps {
            match step {
                ReallocationStep::Delete { payment_id, .. } => {
                    tx.delete_payment(*payment_id).await?;
                }
                ReallocationStep::Reduce { payment_id, from, to } => {
                    if let Some(candidate) = candidates.iter_mut().find(|c| c.id == *payment_id) {
                        candidate.amount = *to;
                        candidate.annotate(format!(
                            "Reduced from {from} to {to} by prepayment on payment {source}"
                        ));
                        tx.update_payment(candidate).await?;
                    }
                }
            }
        }

        info!(
            %contract_id,
            payment_id = %source,
            policy = self.policy.name(),
            %excess,
            deleted = plan.deleted(),
            absorbed = %plan.absorbed(),
            "Reallocated excess into schedule"
        );
        if plan.unapplied > Decimal::ZERO {
            warn!(
                %contract_id,
                unapplied = %plan.unapplied,
                "Excess exceeds remaining schedule"
            );
        }

        Ok(plan)
    }

    /// Puts principal that an undone payment had reallocated back on the schedule.
    ///
    /// The payment's net `prepayment` credit comes back as one trailing
    /// installment due a month after the latest remaining one. Returns the
    /// restored installment, if any.
    pub async fn restore_prepayment<T: LedgerTx>(
        &self,
        tx: &mut T,
        contract_id: ContractId,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Option<Payment>, LedgerError> {
        // Only prepayments since the last adjustment are live; earlier ones
        // were already reversed by a previous undo.
        let prepaid = tx
            .list_payment_entries(payment_id)
            .await?
            .iter()
            .fold(Decimal::ZERO, |acc, e| match e.entry_type {
                EntryType::Prepayment => acc + e.amount,
                EntryType::Adjustment => Decimal::ZERO,
                _ => acc,
            });
        if prepaid <= Decimal::ZERO {
            return Ok(None);
        }

        let latest = tx
            .list_payments(contract_id)
            .await?
            .into_iter()
            .filter(|p| p.id != payment_id && p.payment_type == PaymentType::Installment)
            .map(|p| p.due_date)
            .max()
            .unwrap_or(now);
        let due_date = latest.checked_add_months(Months::new(1)).unwrap_or(latest);

        let mut restored = Payment::scheduled(contract_id, PaymentType::Installment, prepaid, due_date);
        restored.annotate(format!("Restored after undoing payment {payment_id}"));
        tx.insert_payment(&restored).await?;

        info!(
            %contract_id,
            %payment_id,
            amount = %prepaid,
            "Restored reallocated principal as trailing installment"
        );
        Ok(Some(restored))
    }
}
