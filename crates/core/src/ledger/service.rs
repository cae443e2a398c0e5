//! Ledger store operations.
//!
//! Posting, balance materialization, the idempotent interest upsert, and
//! payment reversal. Every function runs inside the caller's transaction so
//! ledger writes and the payment edits that motivated them commit together.

use chrono::{DateTime, Utc};
use parcela_shared::types::{ContractId, PaymentId};
use rust_decimal::Decimal;
use tracing::debug;

use super::balance::ContractBalance;
use super::entry::{Direction, EntryType, LedgerEntry};
use super::error::LedgerError;
use crate::contract::Contract;
use crate::ports::LedgerTx;

/// Result of an interest upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No interest entry existed; one was created.
    Created(LedgerEntry),
    /// The existing entry was overwritten with a new amount.
    Updated {
        /// The amount held before the update.
        previous: Decimal,
        /// The entry after the update.
        entry: LedgerEntry,
    },
    /// The existing entry already held this amount; nothing was written.
    Unchanged(LedgerEntry),
}

/// Stateless service for ledger operations.
pub struct LedgerService;

impl LedgerService {
    /// Validates an entry's amount against its type's sign convention.
    pub fn validate(entry: &LedgerEntry) -> Result<(), LedgerError> {
        if entry.amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let ok = match entry.entry_type.direction() {
            Direction::Debit => entry.amount.is_sign_negative(),
            Direction::Credit => entry.amount.is_sign_positive(),
            Direction::Either => true,
        };
        if ok {
            Ok(())
        } else {
            Err(LedgerError::SignMismatch {
                entry_type: entry.entry_type,
                amount: entry.amount,
            })
        }
    }

    /// Validates and appends an entry.
    pub async fn post<T: LedgerTx>(
        tx: &mut T,
        entry: LedgerEntry,
    ) -> Result<LedgerEntry, LedgerError> {
        Self::validate(&entry)?;
        tx.insert_entry(&entry).await?;
        debug!(
            contract_id = %entry.contract_id,
            entry_type = %entry.entry_type,
            amount = %entry.amount,
            "Posted ledger entry"
        );
        Ok(entry)
    }

    /// Computes a contract's balance from its entries.
    pub async fn balance<T: LedgerTx>(
        tx: &mut T,
        contract_id: ContractId,
    ) -> Result<ContractBalance, LedgerError> {
        let entries = tx.list_entries(contract_id).await?;
        Ok(ContractBalance::from_entries(&entries))
    }

    /// Recomputes the cached balance and saves the contract.
    pub async fn refresh_balance<T: LedgerTx>(
        tx: &mut T,
        contract: &mut Contract,
    ) -> Result<Decimal, LedgerError> {
        let balance = Self::balance(tx, contract.id).await?.balance;
        contract.balance = balance;
        tx.update_contract(contract).await?;
        Ok(balance)
    }

    /// Creates or overwrites the single interest entry of a payment.
    ///
    /// Keyed by `(payment_id, interest)`: re-running with an unchanged
    /// amount writes nothing, and a changed amount replaces the previous
    /// charge instead of stacking a second one.
    pub async fn upsert_interest<T: LedgerTx>(
        tx: &mut T,
        contract_id: ContractId,
        payment_id: PaymentId,
        interest: Decimal,
        description: String,
        entry_date: DateTime<Utc>,
    ) -> Result<UpsertOutcome, LedgerError> {
        let amount = -interest.abs();
        match tx.find_payment_entry(payment_id, EntryType::Interest).await? {
            Some(existing) if existing.amount == amount => Ok(UpsertOutcome::Unchanged(existing)),
            Some(existing) => {
                let previous = existing.amount;
                let entry = LedgerEntry {
                    amount,
                    description: Some(description),
                    entry_date,
                    ..existing
                };
                Self::validate(&entry)?;
                tx.update_entry(&entry).await?;
                Ok(UpsertOutcome::Updated { previous, entry })
            }
            None => {
                let entry = LedgerEntry::new(
                    contract_id,
                    Some(payment_id),
                    amount,
                    EntryType::Interest,
                    description,
                    entry_date,
                );
                let entry = Self::post(tx, entry).await?;
                Ok(UpsertOutcome::Created(entry))
            }
        }
    }

    /// Net funds a payment has put on the ledger (payment + prepayment + adjustments).
    pub async fn net_credited<T: LedgerTx>(
        tx: &mut T,
        payment_id: PaymentId,
    ) -> Result<Decimal, LedgerError> {
        let entries = tx.list_payment_entries(payment_id).await?;
        Ok(entries
            .iter()
            .filter(|e| {
                matches!(
                    e.entry_type,
                    EntryType::Payment | EntryType::Prepayment | EntryType::Adjustment
                )
            })
            .map(|e| e.amount)
            .sum())
    }

    /// Posts one `adjustment` entry cancelling whatever a payment credited.
    ///
    /// Returns `None` when the payment's net credit is already zero.
    pub async fn reverse_payment<T: LedgerTx>(
        tx: &mut T,
        contract_id: ContractId,
        payment_id: PaymentId,
        reason: &str,
        entry_date: DateTime<Utc>,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let net = Self::net_credited(tx, payment_id).await?;
        if net.is_zero() {
            return Ok(None);
        }
        let entry = LedgerEntry::new(
            contract_id,
            Some(payment_id),
            -net,
            EntryType::Adjustment,
            format!("Reversal of payment {payment_id}: {reason}"),
            entry_date,
        );
        Self::post(tx, entry).await.map(Some)
    }

    /// Deletes every entry of a contract. Only contract cancellation may do this.
    pub async fn purge<T: LedgerTx>(
        tx: &mut T,
        contract: &mut Contract,
    ) -> Result<u64, LedgerError> {
        let removed = tx.delete_entries(contract.id).await?;
        Self::refresh_balance(tx, contract).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(amount: Decimal, entry_type: EntryType) -> LedgerEntry {
        LedgerEntry::new(ContractId::new(), None, amount, entry_type, "test", Utc::now())
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(matches!(
            LedgerService::validate(&entry(Decimal::ZERO, EntryType::Payment)),
            Err(LedgerError::ZeroAmount)
        ));
    }

    #[test]
    fn test_validate_enforces_sign_convention() {
        assert!(LedgerService::validate(&entry(dec!(-100), EntryType::Initial)).is_ok());
        assert!(LedgerService::validate(&entry(dec!(100), EntryType::Payment)).is_ok());
        assert!(LedgerService::validate(&entry(dec!(-5), EntryType::Adjustment)).is_ok());
        assert!(LedgerService::validate(&entry(dec!(5), EntryType::Adjustment)).is_ok());

        assert!(matches!(
            LedgerService::validate(&entry(dec!(100), EntryType::Initial)),
            Err(LedgerError::SignMismatch { .. })
        ));
        assert!(matches!(
            LedgerService::validate(&entry(dec!(-100), EntryType::Prepayment)),
            Err(LedgerError::SignMismatch { .. })
        ));
        assert!(matches!(
            LedgerService::validate(&entry(dec!(3), EntryType::Interest)),
            Err(LedgerError::SignMismatch { .. })
        ));
    }
}
