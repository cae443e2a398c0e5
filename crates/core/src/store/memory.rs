//! In-memory store.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! private copy of the state. `commit` writes the copy back; dropping the
//! transaction discards it. A failed write aborts the transaction the way
//! Postgres does: every later call fails until the transaction rolls back to
//! a savepoint.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parcela_shared::types::{ContractId, LotId, PaymentId, UserId};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::contract::{Contract, ContractStatus, LotStatus};
use crate::ledger::{EntryType, LedgerEntry};
use crate::payment::{Payment, PaymentStatus};
use crate::ports::{LedgerRepository, LedgerTx, StoreError};

/// Everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    /// Contracts by id.
    pub contracts: HashMap<ContractId, Contract>,
    /// Payments by id.
    pub payments: HashMap<PaymentId, Payment>,
    /// Ledger entries in posting order.
    pub entries: Vec<LedgerEntry>,
    /// Lot sale statuses.
    pub lots: HashMap<LotId, LotStatus>,
    /// Applicants excluded from interest accrual.
    pub inactive_applicants: HashSet<UserId>,
    /// When set, every ledger insert fails.
    pub fail_entry_inserts: bool,
    /// Payments whose ledger inserts fail.
    pub failing_payments: HashSet<PaymentId>,
}

/// Shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a lot.
    pub async fn add_lot(&self, lot_id: LotId, status: LotStatus) {
        self.state.lock().await.lots.insert(lot_id, status);
    }

    /// Returns a lot's status.
    pub async fn lot_status(&self, lot_id: LotId) -> Option<LotStatus> {
        self.state.lock().await.lots.get(&lot_id).copied()
    }

    /// Marks an applicant inactive.
    pub async fn deactivate_applicant(&self, applicant_id: UserId) {
        self.state.lock().await.inactive_applicants.insert(applicant_id);
    }

    /// Makes every later ledger insert fail (or stop failing).
    pub async fn fail_entry_inserts(&self, fail: bool) {
        self.state.lock().await.fail_entry_inserts = fail;
    }

    /// Makes every later ledger insert referencing `payment_id` fail.
    pub async fn fail_entries_for(&self, payment_id: PaymentId) {
        self.state.lock().await.failing_payments.insert(payment_id);
    }

    /// Returns a committed contract.
    pub async fn contract(&self, id: ContractId) -> Option<Contract> {
        self.state.lock().await.contracts.get(&id).cloned()
    }

    /// Returns a committed payment.
    pub async fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.state.lock().await.payments.get(&id).cloned()
    }

    /// Returns a contract's committed payments ordered by due date.
    pub async fn payments(&self, contract_id: ContractId) -> Vec<Payment> {
        let state = self.state.lock().await;
        payments_of(&state, contract_id)
    }

    /// Returns a contract's committed entries in posting order.
    pub async fn entries(&self, contract_id: ContractId) -> Vec<LedgerEntry> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect()
    }

    /// Moves a payment's due date. Used to simulate the passage of time.
    pub async fn set_due_date(&self, id: PaymentId, due_date: DateTime<Utc>) {
        if let Some(p) = self.state.lock().await.payments.get_mut(&id) {
            p.due_date = due_date;
        }
    }
}

fn payments_of(state: &MemoryState, contract_id: ContractId) -> Vec<Payment> {
    let mut out: Vec<Payment> = state
        .payments
        .values()
        .filter(|p| p.contract_id == contract_id)
        .cloned()
        .collect();
    out.sort_by_key(|p| (p.due_date, p.id));
    out
}

/// A transaction over [`InMemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    savepoint: Option<Box<MemoryState>>,
    aborted: bool,
}

impl MemoryTx {
    fn live(&self) -> Result<(), StoreError> {
        if self.aborted {
            Err(StoreError::Database(
                "current transaction is aborted, commands ignored until rollback".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn abort(&mut self, err: StoreError) -> StoreError {
        self.aborted = true;
        err
    }
}

impl LedgerRepository for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            savepoint: None,
            aborted: false,
        })
    }
}

impl LedgerTx for MemoryTx {
    async fn lock_contract(&mut self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        self.live()?;
        // The store lock is already held for the whole transaction.
        Ok(self.working.contracts.get(&id).cloned())
    }

    async fn find_contract(&mut self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        self.live()?;
        Ok(self.working.contracts.get(&id).cloned())
    }

    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), StoreError> {
        self.live()?;
        self.working.contracts.insert(contract.id, contract.clone());
        Ok(())
    }

    async fn update_contract(&mut self, contract: &Contract) -> Result<(), StoreError> {
        self.live()?;
        match self.working.contracts.get_mut(&contract.id) {
            Some(existing) => {
                *existing = contract.clone();
                Ok(())
            }
            None => Err(self.abort(StoreError::Corrupt(format!(
                "contract {} does not exist",
                contract.id
            )))),
        }
    }

    async fn find_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        self.live()?;
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn list_payments(&mut self, contract_id: ContractId) -> Result<Vec<Payment>, StoreError> {
        self.live()?;
        Ok(payments_of(&self.working, contract_id))
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.live()?;
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.live()?;
        match self.working.payments.get_mut(&payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(self.abort(StoreError::Corrupt(format!(
                "payment {} does not exist",
                payment.id
            )))),
        }
    }

    async fn delete_payment(&mut self, id: PaymentId) -> Result<(), StoreError> {
        self.live()?;
        self.working.payments.remove(&id);
        Ok(())
    }

    async fn delete_open_payments(&mut self, contract_id: ContractId) -> Result<u64, StoreError> {
        self.live()?;
        let before = self.working.payments.len();
        self.working
            .payments
            .retain(|_, p| p.contract_id != contract_id || !p.status.is_open());
        Ok((before - self.working.payments.len()) as u64)
    }

    async fn list_overdue_payments(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Payment>, StoreError> {
        self.live()?;
        let state = &self.working;
        let mut out: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.due_date < now)
            .filter(|p| {
                state.contracts.get(&p.contract_id).is_some_and(|c| {
                    c.status == ContractStatus::Approved
                        && !state.inactive_applicants.contains(&c.applicant_id)
                })
            })
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.due_date, p.id));
        Ok(out)
    }

    async fn update_interest_amounts(
        &mut self,
        updates: &[(PaymentId, Decimal)],
    ) -> Result<(), StoreError> {
        self.live()?;
        for (id, interest) in updates {
            if let Some(p) = self.working.payments.get_mut(id) {
                p.interest_amount = Some(*interest);
            }
        }
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.live()?;
        let failing = self.working.fail_entry_inserts
            || entry
                .payment_id
                .is_some_and(|id| self.working.failing_payments.contains(&id));
        if failing {
            return Err(self.abort(StoreError::Database("ledger insert failed".to_string())));
        }
        if let Some(payment_id) = entry.payment_id {
            let duplicate = matches!(entry.entry_type, EntryType::Interest)
                && self
                    .working
                    .entries
                    .iter()
                    .any(|e| e.payment_id == Some(payment_id) && e.entry_type == EntryType::Interest);
            if duplicate {
                return Err(self.abort(StoreError::Database(format!(
                    "duplicate interest entry for payment {payment_id}"
                ))));
            }
        }
        self.working.entries.push(entry.clone());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.live()?;
        match self.working.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(self.abort(StoreError::Corrupt(format!(
                "ledger entry {} does not exist",
                entry.id
            )))),
        }
    }

    async fn list_entries(
        &mut self,
        contract_id: ContractId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.live()?;
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect())
    }

    async fn list_payment_entries(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.live()?;
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.payment_id == Some(payment_id))
            .cloned()
            .collect())
    }

    async fn find_payment_entry(
        &mut self,
        payment_id: PaymentId,
        entry_type: EntryType,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        self.live()?;
        Ok(self
            .working
            .entries
            .iter()
            .find(|e| e.payment_id == Some(payment_id) && e.entry_type == entry_type)
            .cloned())
    }

    async fn delete_entries(&mut self, contract_id: ContractId) -> Result<u64, StoreError> {
        self.live()?;
        let before = self.working.entries.len();
        self.working.entries.retain(|e| e.contract_id != contract_id);
        Ok((before - self.working.entries.len()) as u64)
    }

    async fn set_lot_status(&mut self, lot_id: LotId, status: LotStatus) -> Result<(), StoreError> {
        self.live()?;
        self.working.lots.insert(lot_id, status);
        Ok(())
    }

    async fn savepoint(&mut self) -> Result<(), StoreError> {
        self.live()?;
        self.savepoint = Some(Box::new(self.working.clone()));
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.live()?;
        self.savepoint = None;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
        let snapshot = self
            .savepoint
            .take()
            .ok_or_else(|| StoreError::Database("no savepoint to roll back to".to_string()))?;
        self.working = *snapshot;
        self.aborted = false;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.live()?;
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{CreateContractInput, FinancingType};
    use crate::ledger::{LedgerService, UpsertOutcome};
    use crate::payment::PaymentType;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
    }

    fn contract() -> Contract {
        Contract::create(
            CreateContractInput {
                lot_id: LotId::new(),
                applicant_id: UserId::new(),
                amount: dec!(12000),
                down_payment: dec!(2000),
                reserve_amount: dec!(0),
                payment_term_months: 10,
                financing_type: FinancingType::Direct,
            },
            now(),
        )
        .unwrap()
    }

    async fn seeded() -> (InMemoryStore, Contract, Payment) {
        let store = InMemoryStore::new();
        let mut c = contract();
        c.status = ContractStatus::Approved;
        let p = Payment::scheduled(c.id, PaymentType::Installment, dec!(1000), now());
        let mut tx = store.begin().await.unwrap();
        tx.insert_contract(&c).await.unwrap();
        tx.insert_payment(&p).await.unwrap();
        tx.commit().await.unwrap();
        (store, c, p)
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (store, c, p) = seeded().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.delete_payment(p.id).await.unwrap();
            LedgerService::post(
                &mut tx,
                LedgerEntry::new(c.id, None, dec!(-12000), EntryType::Initial, "x", now()),
            )
            .await
            .unwrap();
        }
        assert!(store.payment(p.id).await.is_some());
        assert!(store.entries(c.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_interest_upsert_is_idempotent() {
        let (store, c, p) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let first = LedgerService::upsert_interest(
            &mut tx,
            c.id,
            p.id,
            dec!(9.86),
            "30 days overdue".into(),
            now(),
        )
        .await
        .unwrap();
        assert!(matches!(first, UpsertOutcome::Created(_)));

        let again = LedgerService::upsert_interest(
            &mut tx,
            c.id,
            p.id,
            dec!(9.86),
            "30 days overdue".into(),
            now(),
        )
        .await
        .unwrap();
        assert!(matches!(again, UpsertOutcome::Unchanged(_)));

        let later = LedgerService::upsert_interest(
            &mut tx,
            c.id,
            p.id,
            dec!(10.19),
            "31 days overdue".into(),
            now() + Duration::days(1),
        )
        .await
        .unwrap();
        match later {
            UpsertOutcome::Updated { previous, entry } => {
                assert_eq!(previous, dec!(-9.86));
                assert_eq!(entry.amount, dec!(-10.19));
            }
            other => panic!("expected update, got {other:?}"),
        }
        tx.commit().await.unwrap();

        let entries = store.entries(c.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, dec!(-10.19));
        assert_eq!(entries[0].description.as_deref(), Some("31 days overdue"));
    }

    #[tokio::test]
    async fn test_reverse_payment_posts_single_adjustment() {
        let (store, mut c, p) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        for (amount, t) in [
            (dec!(-12000), EntryType::Initial),
            (dec!(1000), EntryType::Payment),
            (dec!(500), EntryType::Prepayment),
        ] {
            let payment_id = (t != EntryType::Initial).then_some(p.id);
            LedgerService::post(&mut tx, LedgerEntry::new(c.id, payment_id, amount, t, "x", now()))
                .await
                .unwrap();
        }
        assert_eq!(
            LedgerService::refresh_balance(&mut tx, &mut c).await.unwrap(),
            dec!(-10500)
        );

        let reversal = LedgerService::reverse_payment(&mut tx, c.id, p.id, "undo", now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reversal.amount, dec!(-1500));
        assert_eq!(reversal.entry_type, EntryType::Adjustment);
        assert_eq!(
            LedgerService::refresh_balance(&mut tx, &mut c).await.unwrap(),
            dec!(-12000)
        );

        // Net credit is now zero: nothing further to reverse.
        assert!(LedgerService::reverse_payment(&mut tx, c.id, p.id, "undo", now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_overdue_listing_filters_contract_and_applicant() {
        let (store, c, p) = seeded().await;
        let later = now() + Duration::days(3);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.list_overdue_payments(later).await.unwrap().len(), 1);
        assert!(tx.list_overdue_payments(now()).await.unwrap().is_empty());
        drop(tx);

        store.deactivate_applicant(c.applicant_id).await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_overdue_payments(later).await.unwrap().is_empty());

        let mut paid = tx.find_payment(p.id).await.unwrap().unwrap();
        paid.status = PaymentStatus::Paid;
        tx.update_payment(&paid).await.unwrap();
        assert!(tx.list_overdue_payments(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_open_payments_keeps_paid() {
        let (store, c, p) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let mut paid = Payment::scheduled(c.id, PaymentType::DownPayment, dec!(2000), now());
        paid.status = PaymentStatus::Paid;
        tx.insert_payment(&paid).await.unwrap();

        assert_eq!(tx.delete_open_payments(c.id).await.unwrap(), 1);
        assert!(tx.find_payment(p.id).await.unwrap().is_none());
        assert!(tx.find_payment(paid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_interest_entry_for_payment_rejected() {
        let (store, c, p) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let entry = LedgerEntry::new(c.id, Some(p.id), dec!(-1), EntryType::Interest, "x", now());
        tx.insert_entry(&entry).await.unwrap();
        let dup = LedgerEntry::new(c.id, Some(p.id), dec!(-2), EntryType::Interest, "x", now());
        assert!(tx.insert_entry(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_write_aborts_until_rollback_to_savepoint() {
        let (store, c, p) = seeded().await;
        store.fail_entries_for(p.id).await;
        let mut tx = store.begin().await.unwrap();

        let kept = LedgerEntry::new(c.id, None, dec!(-12000), EntryType::Initial, "x", now());
        tx.insert_entry(&kept).await.unwrap();

        tx.savepoint().await.unwrap();
        tx.delete_payment(p.id).await.unwrap();
        let bad = LedgerEntry::new(c.id, Some(p.id), dec!(-3), EntryType::Interest, "x", now());
        assert!(tx.insert_entry(&bad).await.is_err());
        assert!(tx.list_entries(c.id).await.is_err());

        tx.rollback_to_savepoint().await.unwrap();
        assert_eq!(tx.list_entries(c.id).await.unwrap().len(), 1);
        assert!(tx.find_payment(p.id).await.unwrap().is_some());
        tx.commit().await.unwrap();

        assert_eq!(store.entries(c.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_aborted_transaction_cannot_commit() {
        let (store, c, p) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let entry = LedgerEntry::new(c.id, Some(p.id), dec!(-1), EntryType::Interest, "x", now());
        tx.insert_entry(&entry).await.unwrap();
        assert!(tx.insert_entry(&entry).await.is_err());
        assert!(tx.commit().await.is_err());
        assert!(store.entries(c.id).await.is_empty());
    }
}
