//! Lifecycle orchestrator.
//!
//! Every operation runs in one store transaction: validate through the
//! state machine, mutate, post to the ledger, recompute the balance, close
//! the contract if it is settled, commit. Notifications are queued on the
//! worker pool only after commit, and the audit record is written last; a
//! failed audit write is logged and does not undo the operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parcela_shared::types::{ContractId, PaymentId, UserId};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::summary::ContractSummary;
use crate::contract::{
    Contract, ContractMachine, ContractStatus, ContractTransition, CreateContractInput, LotStatus,
};
use crate::error::{LifecycleError, LifecycleResult};
use crate::fsm::StateMachine;
use crate::ledger::{EntryType, LedgerEntry, LedgerService};
use crate::payment::{Payment, PaymentMachine, PaymentStatus, PaymentTransition, PaymentType};
use crate::ports::{
    AuditLog, AuditRecord, Clock, LedgerRepository, LedgerTx, NotificationKind, Notifier,
    TaskError, TaskQueue,
};
use crate::reconciliation::{ReallocationPolicy, ReconciliationEngine, ReconciliationOutcome};
use crate::schedule::{self, ScheduleOffsets};

/// Collaborators the orchestrator talks to.
#[derive(Clone)]
pub struct LifecycleDeps {
    /// Background queue for notifications.
    pub tasks: Arc<dyn TaskQueue>,
    /// Notification delivery.
    pub notifier: Arc<dyn Notifier>,
    /// Audit trail.
    pub audit: Arc<dyn AuditLog>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Input for approving a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovePaymentInput {
    /// Corrected scheduled principal, if the administrator changed it.
    pub amount: Option<Decimal>,
    /// Interest to charge on this payment, overriding what accrued.
    pub interest_amount: Option<Decimal>,
    /// Funds actually received.
    pub paid_amount: Decimal,
}

impl ApprovePaymentInput {
    /// Funds received with no overrides.
    #[must_use]
    pub fn received(paid_amount: Decimal) -> Self {
        Self {
            amount: None,
            interest_amount: None,
            paid_amount,
        }
    }
}

/// Drives contracts and payments through their lifecycles.
pub struct LifecycleService<R: LedgerRepository> {
    repo: Arc<R>,
    reconciler: ReconciliationEngine,
    offsets: ScheduleOffsets,
    deps: LifecycleDeps,
}

impl<R: LedgerRepository> LifecycleService<R> {
    /// Creates a service with the default (shorten-term) reallocation policy.
    pub fn new(repo: Arc<R>, deps: LifecycleDeps) -> Self {
        Self {
            repo,
            reconciler: ReconciliationEngine::default(),
            offsets: ScheduleOffsets::default(),
            deps,
        }
    }

    /// Replaces the reallocation policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ReallocationPolicy>) -> Self {
        self.reconciler = ReconciliationEngine::new(policy);
        self
    }

    /// Replaces the schedule offsets.
    #[must_use]
    pub fn with_offsets(mut self, offsets: ScheduleOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    // ========== Contracts ==========

    /// Creates a `pending` contract. No ledger activity.
    pub async fn create_contract(
        &self,
        actor: UserId,
        input: CreateContractInput,
    ) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let contract = Contract::create(input, now)?;

        let mut tx = self.repo.begin().await?;
        tx.insert_contract(&contract).await?;
        tx.commit().await?;

        info!(contract_id = %contract.id, lot_id = %contract.lot_id, amount = %contract.amount, "Contract created");
        self.record(
            actor,
            "create",
            "contract",
            contract.id,
            json!({ "amount": contract.amount, "term": contract.payment_term_months }),
        )
        .await;
        Ok(contract)
    }

    /// Marks a pending contract's documents as submitted for review.
    pub async fn submit_contract(&self, actor: UserId, id: ContractId) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;

        contract.status = ContractMachine::apply(&contract, ContractTransition::Submit)?;
        contract.updated_at = now;
        tx.update_contract(&contract).await?;
        tx.commit().await?;

        info!(contract_id = %id, "Contract submitted for review");
        self.notify_admins(
            "Contract submitted",
            format!("Contract {id} is awaiting review"),
            NotificationKind::Info,
        );
        self.record(actor, "submit", "contract", id, json!({})).await;
        Ok(contract)
    }

    /// Approves a contract: posts the financed principal, generates the
    /// schedule, and reserves the lot.
    pub async fn approve_contract(&self, actor: UserId, id: ContractId) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;

        contract.status = ContractMachine::apply(&contract, ContractTransition::Approve)?;
        contract.approved_at = Some(now);
        contract.rejection_reason = None;
        contract.updated_at = now;

        LedgerService::post(
            &mut tx,
            LedgerEntry::new(
                id,
                None,
                -contract.amount,
                EntryType::Initial,
                format!("Principal financed for lot {}", contract.lot_id),
                now,
            ),
        )
        .await?;

        let rows = schedule::generate(&contract.schedule_terms(), &self.offsets, now)?;
        for row in &rows {
            tx.insert_payment(&Payment::scheduled(id, row.payment_type, row.amount, row.due_date))
                .await?;
        }

        let balance = LedgerService::refresh_balance(&mut tx, &mut contract).await?;
        tx.set_lot_status(contract.lot_id, LotStatus::Reserved).await?;
        tx.commit().await?;

        info!(contract_id = %id, payments = rows.len(), %balance, "Contract approved");
        self.notify_user(
            contract.applicant_id,
            "Contract approved",
            format!(
                "Your contract was approved with {} scheduled payments",
                rows.len()
            ),
            NotificationKind::Success,
        );
        self.record(
            actor,
            "approve",
            "contract",
            id,
            json!({ "payments": rows.len(), "balance": balance }),
        )
        .await;
        Ok(contract)
    }

    /// Rejects a contract and releases its lot.
    pub async fn reject_contract(
        &self,
        actor: UserId,
        id: ContractId,
        reason: &str,
    ) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;

        contract.rejection_reason = Some(reason.trim().to_string());
        contract.status = ContractMachine::apply(&contract, ContractTransition::Reject)?;
        contract.updated_at = now;
        tx.update_contract(&contract).await?;
        tx.set_lot_status(contract.lot_id, LotStatus::Available).await?;
        tx.commit().await?;

        info!(contract_id = %id, "Contract rejected");
        self.notify_user(
            contract.applicant_id,
            "Contract rejected",
            format!("Your contract was rejected: {}", reason.trim()),
            NotificationKind::Warning,
        );
        self.record(actor, "reject", "contract", id, json!({ "reason": reason }))
            .await;
        Ok(contract)
    }

    /// Cancels a contract: deletes its open payments, purges its ledger,
    /// and releases its lot.
    pub async fn cancel_contract(
        &self,
        actor: UserId,
        id: ContractId,
        note: Option<&str>,
    ) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;

        contract.status = ContractMachine::apply(&contract, ContractTransition::Cancel)?;
        contract.cancellation_note = note.map(str::to_string);
        contract.updated_at = now;

        let payments_removed = tx.delete_open_payments(id).await?;
        let entries_removed = LedgerService::purge(&mut tx, &mut contract).await?;
        tx.set_lot_status(contract.lot_id, LotStatus::Available).await?;
        tx.commit().await?;

        info!(
            contract_id = %id,
            payments_removed,
            entries_removed,
            "Contract cancelled"
        );
        self.notify_user(
            contract.applicant_id,
            "Contract cancelled",
            note.map_or_else(
                || "Your contract was cancelled".to_string(),
                |n| format!("Your contract was cancelled: {n}"),
            ),
            NotificationKind::Warning,
        );
        self.record(
            actor,
            "cancel",
            "contract",
            id,
            json!({ "note": note, "payments_removed": payments_removed, "entries_removed": entries_removed }),
        )
        .await;
        Ok(contract)
    }

    /// Closes a settled contract and marks its lot paid.
    pub async fn close_contract(&self, actor: UserId, id: ContractId) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;

        LedgerService::refresh_balance(&mut tx, &mut contract).await?;
        close(&mut tx, &mut contract, now).await?;
        tx.commit().await?;

        info!(contract_id = %id, balance = %contract.balance, "Contract closed");
        self.notify_user(
            contract.applicant_id,
            "Contract paid off",
            "Your contract is fully paid",
            NotificationKind::Success,
        );
        self.record(actor, "close", "contract", id, json!({ "balance": contract.balance }))
            .await;
        Ok(contract)
    }

    /// Reopens a closed contract.
    pub async fn reopen_contract(&self, actor: UserId, id: ContractId) -> LifecycleResult<Contract> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;

        reopen(&mut tx, &mut contract, now).await?;
        tx.update_contract(&contract).await?;
        tx.commit().await?;

        info!(contract_id = %id, "Contract reopened");
        self.record(actor, "reopen", "contract", id, json!({})).await;
        Ok(contract)
    }

    /// Applies a direct capital repayment to an approved contract.
    ///
    /// A `paid` payment of type `capital_repayment` is recorded for
    /// traceability and the whole amount is reallocated over the schedule.
    pub async fn capital_repayment(
        &self,
        actor: UserId,
        id: ContractId,
        amount: Decimal,
    ) -> LifecycleResult<ReconciliationOutcome> {
        if amount <= Decimal::ZERO {
            return Err(LifecycleError::validation(
                "Capital repayment amount must be positive",
            ));
        }
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let mut contract = lock_contract(&mut tx, id).await?;
        if contract.status != ContractStatus::Approved {
            return Err(LifecycleError::validation(format!(
                "Capital repayment requires an approved contract, contract {id} is {}",
                contract.status
            )));
        }

        let mut payment = Payment::scheduled(id, PaymentType::CapitalRepayment, amount, now);
        payment.status = PaymentStatus::Paid;
        payment.paid_amount = Some(amount);
        payment.payment_date = Some(now);
        tx.insert_payment(&payment).await?;

        let outcome = self
            .reconciler
            .apply_capital_repayment(&mut tx, &mut contract, &payment, amount, now)
            .await?;
        let closed = close_if_settled(&mut tx, &mut contract, now).await?;
        tx.commit().await?;

        info!(
            contract_id = %id,
            payment_id = %payment.id,
            %amount,
            balance = %outcome.balance,
            closed,
            "Capital repayment applied"
        );
        self.notify_user(
            contract.applicant_id,
            "Capital repayment received",
            format!("A capital repayment of {amount} was applied to your contract"),
            NotificationKind::Success,
        );
        self.record(
            actor,
            "capital_repayment",
            "contract",
            id,
            json!({
                "payment_id": payment.id,
                "amount": amount,
                "plan": outcome.plan,
                "balance": outcome.balance,
                "closed": closed,
            }),
        )
        .await;
        Ok(outcome)
    }

    // ========== Payments ==========

    /// Attaches a receipt to a payment for review.
    pub async fn submit_payment(
        &self,
        actor: UserId,
        id: PaymentId,
        receipt_ref: &str,
    ) -> LifecycleResult<Payment> {
        let mut tx = self.repo.begin().await?;
        let (contract, mut payment) = lock_payment(&mut tx, id).await?;
        require_approved(&contract)?;

        payment.receipt_ref = Some(receipt_ref.trim().to_string());
        payment.status = PaymentMachine::apply(&payment, PaymentTransition::Submit)?;
        tx.update_payment(&payment).await?;
        tx.commit().await?;

        info!(payment_id = %id, contract_id = %contract.id, "Payment submitted");
        self.notify_admins(
            "Payment submitted",
            format!(
                "A {} payment of {} on contract {} awaits review",
                payment.payment_type, payment.amount, contract.id
            ),
            NotificationKind::Info,
        );
        self.record(actor, "submit", "payment", id, json!({ "receipt_ref": receipt_ref }))
            .await;
        Ok(payment)
    }

    /// Approves a payment: posts the received funds, reallocates any
    /// excess, and closes the contract if nothing is owed.
    pub async fn approve_payment(
        &self,
        actor: UserId,
        id: PaymentId,
        input: ApprovePaymentInput,
    ) -> LifecycleResult<Payment> {
        if input.amount.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(LifecycleError::validation("Payment amount must be positive"));
        }
        if input.interest_amount.is_some_and(|i| i < Decimal::ZERO) {
            return Err(LifecycleError::validation("Interest amount cannot be negative"));
        }

        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let (mut contract, mut payment) = lock_payment(&mut tx, id).await?;
        require_approved(&contract)?;

        payment.paid_amount = Some(input.paid_amount);
        payment.status = PaymentMachine::apply(&payment, PaymentTransition::Approve)?;
        payment.payment_date = Some(now);
        if let Some(amount) = input.amount {
            payment.amount = amount;
        }
        if let Some(interest) = input.interest_amount {
            override_interest(&mut tx, &mut payment, interest, now).await?;
        }
        tx.update_payment(&payment).await?;

        let outcome = self
            .reconciler
            .apply_payment(&mut tx, &mut contract, &payment, input.paid_amount, now)
            .await?;
        let closed = close_if_settled(&mut tx, &mut contract, now).await?;
        tx.commit().await?;

        info!(
            payment_id = %id,
            contract_id = %contract.id,
            paid = %input.paid_amount,
            expected = %outcome.expected,
            excess = %outcome.excess,
            balance = %outcome.balance,
            closed,
            "Payment approved"
        );
        self.notify_user(
            contract.applicant_id,
            "Payment approved",
            format!("Your {} payment of {} was approved", payment.payment_type, input.paid_amount),
            NotificationKind::Success,
        );
        if closed {
            self.notify_user(
                contract.applicant_id,
                "Contract paid off",
                "Your contract is fully paid",
                NotificationKind::Success,
            );
        }
        self.record(
            actor,
            "approve",
            "payment",
            id,
            json!({
                "paid_amount": input.paid_amount,
                "expected": outcome.expected,
                "excess": outcome.excess,
                "plan": outcome.plan,
                "balance": outcome.balance,
                "closed": closed,
            }),
        )
        .await;
        Ok(payment)
    }

    /// Turns down a submitted payment's receipt.
    pub async fn reject_payment(&self, actor: UserId, id: PaymentId) -> LifecycleResult<Payment> {
        let mut tx = self.repo.begin().await?;
        let (contract, mut payment) = lock_payment(&mut tx, id).await?;
        require_approved(&contract)?;

        payment.status = PaymentMachine::apply(&payment, PaymentTransition::Reject)?;
        tx.update_payment(&payment).await?;
        tx.commit().await?;

        info!(payment_id = %id, contract_id = %contract.id, "Payment rejected");
        self.notify_user(
            contract.applicant_id,
            "Payment rejected",
            format!("Your {} payment receipt was rejected", payment.payment_type),
            NotificationKind::Warning,
        );
        self.record(actor, "reject", "payment", id, json!({})).await;
        Ok(payment)
    }

    /// Asks the applicant to correct a submitted payment's receipt.
    pub async fn request_readjustment(
        &self,
        actor: UserId,
        id: PaymentId,
        note: &str,
    ) -> LifecycleResult<Payment> {
        let mut tx = self.repo.begin().await?;
        let (contract, mut payment) = lock_payment(&mut tx, id).await?;
        require_approved(&contract)?;

        payment.status = PaymentMachine::apply(&payment, PaymentTransition::Readjust)?;
        payment.annotate(format!("Readjustment requested: {note}"));
        tx.update_payment(&payment).await?;
        tx.commit().await?;

        info!(payment_id = %id, contract_id = %contract.id, "Payment readjustment requested");
        self.notify_user(
            contract.applicant_id,
            "Payment needs correction",
            note.to_string(),
            NotificationKind::Warning,
        );
        self.record(actor, "readjust", "payment", id, json!({ "note": note }))
            .await;
        Ok(payment)
    }

    /// Reverts a paid payment to pending.
    ///
    /// Posts one adjustment cancelling the payment's credits, restores any
    /// principal its excess had reallocated as a trailing installment, and
    /// reopens the contract if the payment had closed it. A contract whose
    /// balance still shows nothing owed afterwards is closed again.
    pub async fn undo_payment(&self, actor: UserId, id: PaymentId) -> LifecycleResult<Payment> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let (mut contract, mut payment) = lock_payment(&mut tx, id).await?;

        if payment.payment_type == PaymentType::CapitalRepayment {
            return Err(LifecycleError::validation(
                "Capital repayments cannot be undone",
            ));
        }
        if !matches!(
            contract.status,
            ContractStatus::Approved | ContractStatus::Closed
        ) {
            return Err(LifecycleError::validation(format!(
                "Payments on a {} contract cannot be undone",
                contract.status
            )));
        }

        payment.status = PaymentMachine::apply(&payment, PaymentTransition::Undo)?;
        let reopened = if contract.status == ContractStatus::Closed {
            reopen(&mut tx, &mut contract, now).await?;
            true
        } else {
            false
        };

        let restored = self
            .reconciler
            .restore_prepayment(&mut tx, contract.id, id, now)
            .await?;
        let reversal = LedgerService::reverse_payment(&mut tx, contract.id, id, "payment undone", now)
            .await?;

        // The reversal also cancels any waiver, so the live interest entry is
        // again what this payment owes.
        payment.interest_amount = tx
            .find_payment_entry(id, EntryType::Interest)
            .await?
            .map(|e| -e.amount);
        payment.paid_amount = None;
        payment.payment_date = None;
        payment.annotate(format!("Payment undone at {}", now.to_rfc3339()));
        tx.update_payment(&payment).await?;

        contract.updated_at = now;
        let balance = LedgerService::refresh_balance(&mut tx, &mut contract).await?;
        let closed = close_if_settled(&mut tx, &mut contract, now).await?;
        tx.commit().await?;

        info!(
            payment_id = %id,
            contract_id = %contract.id,
            reversed = %reversal.as_ref().map_or(Decimal::ZERO, |e| e.amount),
            restored = restored.is_some(),
            reopened,
            closed,
            %balance,
            "Payment undone"
        );
        self.notify_user(
            contract.applicant_id,
            "Payment reverted",
            format!("Your {} payment was reverted to pending", payment.payment_type),
            NotificationKind::Warning,
        );
        self.record(
            actor,
            "undo",
            "payment",
            id,
            json!({
                "reversal": reversal.map(|e| e.amount),
                "restored_installment": restored.map(|p| p.id),
                "reopened": reopened,
                "closed": closed,
                "balance": balance,
            }),
        )
        .await;
        Ok(payment)
    }

    // ========== Queries ==========

    /// Summarizes where a contract stands.
    pub async fn contract_summary(&self, id: ContractId) -> LifecycleResult<ContractSummary> {
        let now = self.deps.clock.now();
        let mut tx = self.repo.begin().await?;
        let contract = tx
            .find_contract(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("contract", id))?;
        let payments = tx.list_payments(id).await?;
        let entries = tx.list_entries(id).await?;
        Ok(ContractSummary::build(contract, &payments, &entries, now))
    }

    // ========== Side effects ==========

    fn notify_user(
        &self,
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) {
        let notifier = Arc::clone(&self.deps.notifier);
        let (title, message) = (title.into(), message.into());
        self.deps.tasks.enqueue(
            "notify_user",
            async move {
                notifier
                    .notify_user(user_id, &title, &message, kind)
                    .await
                    .map_err(TaskError::from)
            }
            .boxed(),
        );
    }

    fn notify_admins(&self, title: impl Into<String>, message: impl Into<String>, kind: NotificationKind) {
        let notifier = Arc::clone(&self.deps.notifier);
        let (title, message) = (title.into(), message.into());
        self.deps.tasks.enqueue(
            "notify_admins",
            async move {
                notifier
                    .notify_admins(&title, &message, kind)
                    .await
                    .map_err(TaskError::from)
            }
            .boxed(),
        );
    }

    async fn record(
        &self,
        actor_id: UserId,
        action: &'static str,
        entity: &'static str,
        entity_id: impl Into<Uuid>,
        details: serde_json::Value,
    ) {
        let entity_id = entity_id.into();
        let record = AuditRecord {
            actor_id,
            action,
            entity,
            entity_id,
            details,
        };
        if let Err(e) = self.deps.audit.log(record).await {
            warn!(%actor_id, action, entity, %entity_id, error = %e, "Audit log write failed");
        }
    }
}

async fn lock_contract<T: LedgerTx>(tx: &mut T, id: ContractId) -> LifecycleResult<Contract> {
    tx.lock_contract(id)
        .await?
        .ok_or_else(|| LifecycleError::not_found("contract", id))
}

async fn lock_payment<T: LedgerTx>(tx: &mut T, id: PaymentId) -> LifecycleResult<(Contract, Payment)> {
    let payment = tx
        .find_payment(id)
        .await?
        .ok_or_else(|| LifecycleError::not_found("payment", id))?;
    let contract = lock_contract(tx, payment.contract_id).await?;
    // Re-read under the contract lock.
    let payment = tx
        .find_payment(id)
        .await?
        .ok_or_else(|| LifecycleError::not_found("payment", id))?;
    Ok((contract, payment))
}

fn require_approved(contract: &Contract) -> LifecycleResult<()> {
    if contract.status == ContractStatus::Approved {
        Ok(())
    } else {
        Err(LifecycleError::validation(format!(
            "Contract {} is {}, payments can only change on approved contracts",
            contract.id, contract.status
        )))
    }
}

/// Sets a payment's interest and brings its ledger charge in line.
async fn override_interest<T: LedgerTx>(
    tx: &mut T,
    payment: &mut Payment,
    interest: Decimal,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    payment.interest_amount = Some(interest);
    if interest > Decimal::ZERO {
        LedgerService::upsert_interest(
            tx,
            payment.contract_id,
            payment.id,
            interest,
            format!("Interest set to {interest} on approval"),
            now,
        )
        .await?;
    } else if let Some(charged) = tx.find_payment_entry(payment.id, EntryType::Interest).await? {
        LedgerService::post(
            tx,
            LedgerEntry::new(
                payment.contract_id,
                Some(payment.id),
                -charged.amount,
                EntryType::Adjustment,
                "Overdue interest waived",
                now,
            ),
        )
        .await?;
    }
    Ok(())
}

async fn close<T: LedgerTx>(
    tx: &mut T,
    contract: &mut Contract,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    contract.status = ContractMachine::apply(contract, ContractTransition::Close)?;
    contract.closed_at = Some(now);
    contract.updated_at = now;
    tx.update_contract(contract).await?;
    tx.set_lot_status(contract.lot_id, LotStatus::Paid).await?;
    Ok(())
}

async fn reopen<T: LedgerTx>(
    tx: &mut T,
    contract: &mut Contract,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    contract.status = ContractMachine::apply(contract, ContractTransition::Reopen)?;
    contract.closed_at = None;
    contract.updated_at = now;
    tx.set_lot_status(contract.lot_id, LotStatus::Reserved).await?;
    Ok(())
}

/// Closes `contract` if its freshly computed balance shows nothing owed.
async fn close_if_settled<T: LedgerTx>(
    tx: &mut T,
    contract: &mut Contract,
    now: DateTime<Utc>,
) -> LifecycleResult<bool> {
    if contract.status != ContractStatus::Approved || !contract.is_settled() {
        return Ok(false);
    }
    close(tx, contract, now).await?;
    info!(contract_id = %contract.id, balance = %contract.balance, "Contract settled, closing");
    Ok(true)
}
