//! Persistence port.
//!
//! All reads and writes of one lifecycle operation go through a single
//! [`LedgerTx`]. Nothing is visible to other transactions until
//! [`LedgerTx::commit`] succeeds; dropping a transaction rolls it back.

use std::future::Future;

use chrono::{DateTime, Utc};
use parcela_shared::types::{ContractId, LotId, PaymentId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::contract::{Contract, LotStatus};
use crate::ledger::{EntryType, LedgerEntry};
use crate::payment::Payment;

/// Errors raised by a store implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Another transaction modified the contract first.
    #[error("Concurrent modification detected for contract {0}, please retry")]
    Conflict(ContractId),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Opens transactions against the contract/payment/ledger store.
pub trait LedgerRepository: Send + Sync + 'static {
    /// The transaction handle type.
    type Tx: LedgerTx;

    /// Begins a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// Operations available inside one store transaction.
pub trait LedgerTx: Send {
    // ========== Contracts ==========

    /// Loads a contract and takes the per-contract serialization lock.
    ///
    /// Reconciliation reads the payment set, edits it, and recomputes the
    /// balance; holding this lock until commit keeps two such passes on the
    /// same contract from interleaving.
    fn lock_contract(
        &mut self,
        id: ContractId,
    ) -> impl Future<Output = Result<Option<Contract>, StoreError>> + Send;

    /// Loads a contract without locking it.
    fn find_contract(
        &mut self,
        id: ContractId,
    ) -> impl Future<Output = Result<Option<Contract>, StoreError>> + Send;

    /// Inserts a new contract.
    fn insert_contract(
        &mut self,
        contract: &Contract,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites a contract.
    fn update_contract(
        &mut self,
        contract: &Contract,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // ========== Payments ==========

    /// Loads a payment.
    fn find_payment(
        &mut self,
        id: PaymentId,
    ) -> impl Future<Output = Result<Option<Payment>, StoreError>> + Send;

    /// Lists a contract's payments ordered by due date ascending.
    fn list_payments(
        &mut self,
        contract_id: ContractId,
    ) -> impl Future<Output = Result<Vec<Payment>, StoreError>> + Send;

    /// Inserts a payment.
    fn insert_payment(
        &mut self,
        payment: &Payment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites a payment.
    fn update_payment(
        &mut self,
        payment: &Payment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a payment.
    fn delete_payment(
        &mut self,
        id: PaymentId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a contract's `pending` and `submitted` payments, returning how many were removed.
    fn delete_open_payments(
        &mut self,
        contract_id: ContractId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Payments in `pending` status due before `now` whose contract is
    /// `approved` and whose applicant is active.
    fn list_overdue_payments(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Payment>, StoreError>> + Send;

    /// Sets `interest_amount` on many payments at once.
    fn update_interest_amounts(
        &mut self,
        updates: &[(PaymentId, Decimal)],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // ========== Ledger ==========

    /// Appends a ledger entry.
    fn insert_entry(
        &mut self,
        entry: &LedgerEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites an entry. Only the interest upsert uses this.
    fn update_entry(
        &mut self,
        entry: &LedgerEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lists a contract's entries in posting order.
    fn list_entries(
        &mut self,
        contract_id: ContractId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;

    /// Lists the entries referencing a payment, in posting order.
    fn list_payment_entries(
        &mut self,
        payment_id: PaymentId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;

    /// Finds the entry of a given type referencing a payment.
    fn find_payment_entry(
        &mut self,
        payment_id: PaymentId,
        entry_type: EntryType,
    ) -> impl Future<Output = Result<Option<LedgerEntry>, StoreError>> + Send;

    /// Deletes every entry of a contract, returning how many were removed.
    fn delete_entries(
        &mut self,
        contract_id: ContractId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    // ========== Lots ==========

    /// Updates a lot's sale status.
    fn set_lot_status(
        &mut self,
        lot_id: LotId,
        status: LotStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // ========== Savepoints ==========

    /// Marks a point inside the transaction that a failed record can roll back to.
    ///
    /// A failed statement leaves the transaction unusable until it is rolled
    /// back to the last savepoint. Batch jobs open one per record so a single
    /// failure costs only that record's writes.
    fn savepoint(&mut self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Keeps everything written since the last savepoint.
    fn release_savepoint(&mut self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Discards everything written since the last savepoint.
    fn rollback_to_savepoint(&mut self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Commits the transaction.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
