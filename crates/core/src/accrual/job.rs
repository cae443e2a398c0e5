//! The accrual job.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parcela_shared::config::AccrualConfig;
use parcela_shared::types::{ContractId, PaymentId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::interest::{days_overdue, simple_interest};
use crate::error::LifecycleResult;
use crate::ledger::{LedgerError, LedgerService, UpsertOutcome};
use crate::payment::Payment;
use crate::ports::{LedgerRepository, LedgerTx};

/// Accrual parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualSettings {
    /// Annual simple-interest rate, as a fraction (0.12 = 12%).
    pub annual_rate: Decimal,
}

impl From<&AccrualConfig> for AccrualSettings {
    fn from(config: &AccrualConfig) -> Self {
        Self {
            annual_rate: config.annual_rate,
        }
    }
}

/// Counters for one accrual run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccrualReport {
    /// Overdue payments examined.
    pub scanned: usize,
    /// Interest entries created.
    pub created: usize,
    /// Interest entries overwritten with a new amount.
    pub updated: usize,
    /// Interest entries already holding the right amount.
    pub unchanged: usize,
    /// Payments with nothing to charge yet.
    pub skipped: usize,
    /// Payments whose accrual failed.
    pub failed: usize,
    /// Contracts whose balance was recomputed.
    pub contracts_refreshed: usize,
}

/// Charges simple interest on overdue payments.
pub struct AccrualJob<R: LedgerRepository> {
    repo: Arc<R>,
    settings: AccrualSettings,
}

impl<R: LedgerRepository> AccrualJob<R> {
    /// Creates a job over `repo`.
    pub fn new(repo: Arc<R>, settings: AccrualSettings) -> Self {
        Self { repo, settings }
    }

    /// Runs one accrual pass as of `now`.
    ///
    /// The whole pass is one transaction with a savepoint around each record.
    /// A record that fails is rolled back to its savepoint, logged and
    /// counted; the rest of the batch carries on.
    #[instrument(skip(self), fields(annual_rate = %self.settings.annual_rate))]
    pub async fn run(&self, now: DateTime<Utc>) -> LifecycleResult<AccrualReport> {
        let mut tx = self.repo.begin().await?;
        let overdue = tx.list_overdue_payments(now).await?;

        let mut report = AccrualReport {
            scanned: overdue.len(),
            ..AccrualReport::default()
        };
        let mut mirrored: Vec<(PaymentId, Decimal)> = Vec::new();
        let mut touched: BTreeSet<ContractId> = BTreeSet::new();

        for payment in &overdue {
            tx.savepoint().await?;
            let result = self.accrue(&mut tx, payment, now).await;
            if result.is_ok() {
                tx.release_savepoint().await?;
            } else {
                tx.rollback_to_savepoint().await?;
            }
            match result {
                Ok(None) => report.skipped += 1,
                Ok(Some((outcome, interest))) => {
                    match outcome {
                        UpsertOutcome::Created(_) => report.created += 1,
                        UpsertOutcome::Updated { .. } => report.updated += 1,
                        UpsertOutcome::Unchanged(_) => report.unchanged += 1,
                    }
                    if payment.interest_amount != Some(interest) {
                        mirrored.push((payment.id, interest));
                    }
                    if !matches!(outcome, UpsertOutcome::Unchanged(_)) {
                        touched.insert(payment.contract_id);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        payment_id = %payment.id,
                        contract_id = %payment.contract_id,
                        error = %e,
                        "Interest accrual failed for payment"
                    );
                }
            }
        }

        if !mirrored.is_empty() {
            tx.update_interest_amounts(&mirrored).await?;
        }

        for contract_id in touched {
            let Some(mut contract) = tx.lock_contract(contract_id).await? else {
                warn!(%contract_id, "Contract vanished during accrual");
                continue;
            };
            LedgerService::refresh_balance(&mut tx, &mut contract).await?;
            report.contracts_refreshed += 1;
        }

        tx.commit().await?;

        info!(
            scanned = report.scanned,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            contracts_refreshed = report.contracts_refreshed,
            "Overdue interest accrual finished"
        );
        Ok(report)
    }

    async fn accrue(
        &self,
        tx: &mut R::Tx,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Option<(UpsertOutcome, Decimal)>, LedgerError> {
        let days = days_overdue(payment.due_date, now);
        if days <= 0 {
            return Ok(None);
        }
        let interest = simple_interest(payment.amount, self.settings.annual_rate, days);
        if interest.is_zero() {
            return Ok(None);
        }

        let outcome = LedgerService::upsert_interest(
            tx,
            payment.contract_id,
            payment.id,
            interest,
            format!(
                "Overdue interest: {days} days at {}% on {}",
                self.settings.annual_rate * Decimal::ONE_HUNDRED,
                payment.amount
            ),
            now,
        )
        .await?;
        Ok(Some((outcome, interest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Contract, ContractStatus, CreateContractInput, FinancingType};
    use crate::ledger::EntryType;
    use crate::payment::{PaymentStatus, PaymentType};
    use crate::store::InMemoryStore;
    use chrono::{Duration, TimeZone};
    use parcela_shared::types::{LotId, UserId};
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    async fn approved_with_installment(store: &InMemoryStore) -> (Contract, Payment) {
        let mut contract = Contract::create(
            CreateContractInput {
                lot_id: LotId::new(),
                applicant_id: UserId::new(),
                amount: dec!(1000),
                down_payment: dec!(0),
                reserve_amount: dec!(0),
                payment_term_months: 1,
                financing_type: FinancingType::Direct,
            },
            start(),
        )
        .unwrap();
        contract.status = ContractStatus::Approved;
        let payment = Payment::scheduled(contract.id, PaymentType::Installment, dec!(1000), start());

        let mut tx = store.begin().await.unwrap();
        tx.insert_contract(&contract).await.unwrap();
        tx.insert_payment(&payment).await.unwrap();
        LedgerService::post(
            &mut tx,
            crate::ledger::LedgerEntry::new(
                contract.id,
                None,
                dec!(-1000),
                EntryType::Initial,
                "principal",
                start(),
            ),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (contract, payment)
    }

    fn job(store: &InMemoryStore) -> AccrualJob<InMemoryStore> {
        AccrualJob::new(
            Arc::new(store.clone()),
            AccrualSettings {
                annual_rate: dec!(0.12),
            },
        )
    }

    #[tokio::test]
    async fn test_rerun_same_day_charges_once() {
        let store = InMemoryStore::new();
        let (contract, payment) = approved_with_installment(&store).await;
        let now = start() + Duration::days(30);

        let first = job(&store).run(now).await.unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(first.contracts_refreshed, 1);

        let second = job(&store).run(now + Duration::hours(5)).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.contracts_refreshed, 0);

        let interest: Vec<_> = store
            .entries(contract.id)
            .await
            .into_iter()
            .filter(|e| e.entry_type == EntryType::Interest)
            .collect();
        assert_eq!(interest.len(), 1);
        assert_eq!(interest[0].amount, dec!(-9.86));
        assert_eq!(
            store.payment(payment.id).await.unwrap().interest_amount,
            Some(dec!(9.86))
        );
        assert_eq!(store.contract(contract.id).await.unwrap().balance, dec!(-1009.86));
    }

    #[tokio::test]
    async fn test_next_day_overwrites_entry() {
        let store = InMemoryStore::new();
        let (contract, _) = approved_with_installment(&store).await;

        job(&store).run(start() + Duration::days(30)).await.unwrap();
        let report = job(&store).run(start() + Duration::days(31)).await.unwrap();
        assert_eq!(report.updated, 1);

        let entries = store.entries(contract.id).await;
        let interest: Vec<_> = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Interest)
            .collect();
        assert_eq!(interest.len(), 1);
        assert_eq!(interest[0].amount, dec!(-10.19));
        assert_eq!(store.contract(contract.id).await.unwrap().balance, dec!(-1010.19));
    }

    #[tokio::test]
    async fn test_less_than_a_day_is_skipped() {
        let store = InMemoryStore::new();
        approved_with_installment(&store).await;
        let report = job(&store).run(start() + Duration::hours(20)).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn test_inactive_applicant_and_paid_payments_excluded() {
        let store = InMemoryStore::new();
        let (contract, _) = approved_with_installment(&store).await;
        store.deactivate_applicant(contract.applicant_id).await;

        let (_, other) = approved_with_installment(&store).await;
        let mut tx = store.begin().await.unwrap();
        let mut paid = tx.find_payment(other.id).await.unwrap().unwrap();
        paid.status = PaymentStatus::Paid;
        tx.update_payment(&paid).await.unwrap();
        tx.commit().await.unwrap();

        let report = job(&store).run(start() + Duration::days(10)).await.unwrap();
        assert_eq!(report, AccrualReport::default());
    }

    #[tokio::test]
    async fn test_record_failure_does_not_abort_batch() {
        let store = InMemoryStore::new();
        approved_with_installment(&store).await;
        approved_with_installment(&store).await;
        store.fail_entry_inserts(true).await;

        let report = job(&store).run(start() + Duration::days(5)).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn test_failed_record_rolls_back_alone() {
        let store = InMemoryStore::new();
        let (broken, bad) = approved_with_installment(&store).await;
        let (healthy, good) = approved_with_installment(&store).await;
        store.set_due_date(bad.id, start() - Duration::days(1)).await;
        store.fail_entries_for(bad.id).await;

        let report = job(&store).run(start() + Duration::days(30)).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.contracts_refreshed, 1);

        assert_eq!(store.payment(bad.id).await.unwrap().interest_amount, None);
        assert_eq!(store.contract(broken.id).await.unwrap().balance, Decimal::ZERO);
        assert_eq!(
            store.payment(good.id).await.unwrap().interest_amount,
            Some(dec!(9.86))
        );
        let balance = store.contract(healthy.id).await.unwrap().balance;
        let ledger: Decimal = store.entries(healthy.id).await.iter().map(|e| e.amount).sum();
        assert_eq!(balance, dec!(-1009.86));
        assert_eq!(balance, ledger);
    }
}
