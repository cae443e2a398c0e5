//! Postgres implementation of the ledger store.
//!
//! Each [`PgTx`] wraps one database transaction. Contract locks are row
//! locks (`SELECT ... FOR UPDATE`) held until commit or rollback. Savepoints
//! are plain `SAVEPOINT` statements on the same connection.

use chrono::{DateTime, Utc};
use parcela_core::contract::{Contract, ContractStatus, FinancingType, LotStatus};
use parcela_core::ledger::{EntryType, LedgerEntry};
use parcela_core::payment::{Payment, PaymentStatus, PaymentType};
use parcela_core::ports::{LedgerRepository, LedgerTx, StoreError};
use parcela_shared::types::{ContractId, LedgerEntryId, LotId, PaymentId, UserId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{CaseStatement, Expr, Query, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use tracing::debug;

use crate::entities::{applicants, contracts, ledger_entries, lots, payments};

const RECORD_SAVEPOINT: &str = "parcela_record";

fn db_err(err: DbErr) -> StoreError {
    StoreError::Database(err.to_string())
}

/// Opens Postgres transactions for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl LedgerRepository for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        Ok(PgTx { txn })
    }
}

/// One open Postgres transaction. Dropping it rolls back.
pub struct PgTx {
    txn: DatabaseTransaction,
}

impl LedgerTx for PgTx {
    // ========== Contracts ==========

    async fn lock_contract(&mut self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        contracts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(contract_from_model)
            .transpose()
    }

    async fn find_contract(&mut self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        contracts::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(contract_from_model)
            .transpose()
    }

    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), StoreError> {
        contract_to_active(contract)?
            .insert(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_contract(&mut self, contract: &Contract) -> Result<(), StoreError> {
        contract_to_active(contract)?
            .update(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ========== Payments ==========

    async fn find_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        payments::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(payment_from_model)
            .transpose()
    }

    async fn list_payments(&mut self, contract_id: ContractId) -> Result<Vec<Payment>, StoreError> {
        payments::Entity::find()
            .filter(payments::Column::ContractId.eq(contract_id.into_inner()))
            .order_by_asc(payments::Column::DueDate)
            .order_by_asc(payments::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(payment_from_model)
            .collect()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        payment_to_active(payment)
            .insert(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        payment_to_active(payment)
            .update(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_payment(&mut self, id: PaymentId) -> Result<(), StoreError> {
        payments::Entity::delete_by_id(id.into_inner())
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_open_payments(&mut self, contract_id: ContractId) -> Result<u64, StoreError> {
        let result = payments::Entity::delete_many()
            .filter(payments::Column::ContractId.eq(contract_id.into_inner()))
            .filter(payments::Column::Status.is_in([
                PaymentStatus::Pending.as_str(),
                PaymentStatus::Submitted.as_str(),
            ]))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        debug!(%contract_id, removed = result.rows_affected, "Deleted open payments");
        Ok(result.rows_affected)
    }

    async fn list_overdue_payments(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Payment>, StoreError> {
        let active_contracts = Query::select()
            .column(contracts::Column::Id)
            .from(contracts::Entity)
            .and_where(contracts::Column::Status.eq(ContractStatus::Approved.as_str()))
            .and_where(
                contracts::Column::ApplicantId.in_subquery(
                    Query::select()
                        .column(applicants::Column::Id)
                        .from(applicants::Entity)
                        .and_where(applicants::Column::IsActive.eq(true))
                        .to_owned(),
                ),
            )
            .to_owned();

        payments::Entity::find()
            .filter(payments::Column::Status.eq(PaymentStatus::Pending.as_str()))
            .filter(payments::Column::DueDate.lt(now))
            .filter(payments::Column::ContractId.in_subquery(active_contracts))
            .order_by_asc(payments::Column::DueDate)
            .order_by_asc(payments::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(payment_from_model)
            .collect()
    }

    async fn update_interest_amounts(
        &mut self,
        updates: &[(PaymentId, Decimal)],
    ) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        // One UPDATE with a CASE over the ids instead of a round trip per row.
        let case = updates
            .iter()
            .fold(CaseStatement::new(), |case, (id, amount)| {
                case.case(payments::Column::Id.eq(id.into_inner()), Expr::val(*amount))
            })
            .finally(Expr::col(payments::Column::InterestAmount));

        payments::Entity::update_many()
            .col_expr(payments::Column::InterestAmount, SimpleExpr::Case(Box::new(case)))
            .filter(payments::Column::Id.is_in(updates.iter().map(|(id, _)| id.into_inner())))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        debug!(count = updates.len(), "Updated payment interest amounts");
        Ok(())
    }

    // ========== Ledger ==========

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let model = ledger_entries::ActiveModel {
            id: Set(entry.id.into_inner()),
            contract_id: Set(entry.contract_id.into_inner()),
            payment_id: Set(entry.payment_id.map(PaymentId::into_inner)),
            amount: Set(entry.amount),
            entry_type: Set(entry.entry_type.as_str().to_string()),
            description: Set(entry.description.clone()),
            entry_date: Set(entry.entry_date.into()),
            created_at: Set(Utc::now().into()),
        };
        model.insert(&self.txn).await.map_err(db_err)?;
        Ok(())
    }

    async fn update_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let result = ledger_entries::Entity::update_many()
            .col_expr(ledger_entries::Column::Amount, Expr::value(entry.amount))
            .col_expr(
                ledger_entries::Column::Description,
                Expr::value(entry.description.clone()),
            )
            .col_expr(
                ledger_entries::Column::EntryDate,
                Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(entry.entry_date)),
            )
            .filter(ledger_entries::Column::Id.eq(entry.id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::Corrupt(format!("ledger entry {} not found", entry.id)));
        }
        Ok(())
    }

    async fn list_entries(
        &mut self,
        contract_id: ContractId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::ContractId.eq(contract_id.into_inner()))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(entry_from_model)
            .collect()
    }

    async fn list_payment_entries(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::PaymentId.eq(payment_id.into_inner()))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(entry_from_model)
            .collect()
    }

    async fn find_payment_entry(
        &mut self,
        payment_id: PaymentId,
        entry_type: EntryType,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::PaymentId.eq(payment_id.into_inner()))
            .filter(ledger_entries::Column::EntryType.eq(entry_type.as_str()))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(entry_from_model)
            .transpose()
    }

    async fn delete_entries(&mut self, contract_id: ContractId) -> Result<u64, StoreError> {
        let result = ledger_entries::Entity::delete_many()
            .filter(ledger_entries::Column::ContractId.eq(contract_id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    // ========== Lots ==========

    async fn set_lot_status(&mut self, lot_id: LotId, status: LotStatus) -> Result<(), StoreError> {
        let now: DateTime<Utc> = Utc::now();
        let result = lots::Entity::update_many()
            .col_expr(lots::Column::Status, Expr::value(status.as_str()))
            .col_expr(
                lots::Column::UpdatedAt,
                Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(now)),
            )
            .filter(lots::Column::Id.eq(lot_id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::Corrupt(format!("lot {lot_id} not found")));
        }
        Ok(())
    }

    // ========== Savepoints ==========

    async fn savepoint(&mut self) -> Result<(), StoreError> {
        self.txn
            .execute_unprepared(&format!("SAVEPOINT {RECORD_SAVEPOINT}"))
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.txn
            .execute_unprepared(&format!("RELEASE SAVEPOINT {RECORD_SAVEPOINT}"))
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
        self.txn
            .execute_unprepared(&format!("ROLLBACK TO SAVEPOINT {RECORD_SAVEPOINT}"))
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(db_err)
    }
}

// ========== Mapping ==========

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Corrupt(format!("unknown {what} '{value}'"))
}

fn contract_from_model(model: contracts::Model) -> Result<Contract, StoreError> {
    Ok(Contract {
        id: ContractId::from_uuid(model.id),
        lot_id: LotId::from_uuid(model.lot_id),
        applicant_id: UserId::from_uuid(model.applicant_id),
        amount: model.amount,
        down_payment: model.down_payment,
        reserve_amount: model.reserve_amount,
        payment_term_months: u32::try_from(model.payment_term_months).map_err(|_| {
            StoreError::Corrupt(format!("negative term on contract {}", model.id))
        })?,
        financing_type: FinancingType::parse(&model.financing_type)
            .ok_or_else(|| corrupt("financing type", &model.financing_type))?,
        status: ContractStatus::parse(&model.status)
            .ok_or_else(|| corrupt("contract status", &model.status))?,
        balance: model.balance,
        rejection_reason: model.rejection_reason,
        cancellation_note: model.cancellation_note,
        approved_at: model.approved_at.map(|t| t.with_timezone(&Utc)),
        closed_at: model.closed_at.map(|t| t.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn contract_to_active(contract: &Contract) -> Result<contracts::ActiveModel, StoreError> {
    let term = i32::try_from(contract.payment_term_months).map_err(|_| {
        StoreError::Corrupt(format!("term out of range on contract {}", contract.id))
    })?;
    let model = contracts::Model {
        id: contract.id.into_inner(),
        lot_id: contract.lot_id.into_inner(),
        applicant_id: contract.applicant_id.into_inner(),
        amount: contract.amount,
        down_payment: contract.down_payment,
        reserve_amount: contract.reserve_amount,
        payment_term_months: term,
        financing_type: contract.financing_type.as_str().to_string(),
        status: contract.status.as_str().to_string(),
        balance: contract.balance,
        rejection_reason: contract.rejection_reason.clone(),
        cancellation_note: contract.cancellation_note.clone(),
        approved_at: contract.approved_at.map(Into::into),
        closed_at: contract.closed_at.map(Into::into),
        created_at: contract.created_at.into(),
        updated_at: contract.updated_at.into(),
    };
    // Every column is written on update, so mark all of them as set.
    Ok(model.into_active_model().reset_all())
}

fn payment_from_model(model: payments::Model) -> Result<Payment, StoreError> {
    Ok(Payment {
        id: PaymentId::from_uuid(model.id),
        contract_id: ContractId::from_uuid(model.contract_id),
        amount: model.amount,
        paid_amount: model.paid_amount,
        interest_amount: model.interest_amount,
        due_date: model.due_date.with_timezone(&Utc),
        payment_date: model.payment_date.map(|t| t.with_timezone(&Utc)),
        status: PaymentStatus::parse(&model.status)
            .ok_or_else(|| corrupt("payment status", &model.status))?,
        payment_type: PaymentType::parse(&model.payment_type)
            .ok_or_else(|| corrupt("payment type", &model.payment_type))?,
        receipt_ref: model.receipt_ref,
        notes: model.notes,
    })
}

fn payment_to_active(payment: &Payment) -> payments::ActiveModel {
    let model = payments::Model {
        id: payment.id.into_inner(),
        contract_id: payment.contract_id.into_inner(),
        amount: payment.amount,
        paid_amount: payment.paid_amount,
        interest_amount: payment.interest_amount,
        due_date: payment.due_date.into(),
        payment_date: payment.payment_date.map(Into::into),
        status: payment.status.as_str().to_string(),
        payment_type: payment.payment_type.as_str().to_string(),
        receipt_ref: payment.receipt_ref.clone(),
        notes: payment.notes.clone(),
    };
    model.into_active_model().reset_all()
}

fn entry_from_model(model: ledger_entries::Model) -> Result<LedgerEntry, StoreError> {
    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(model.id),
        contract_id: ContractId::from_uuid(model.contract_id),
        payment_id: model.payment_id.map(PaymentId::from_uuid),
        amount: model.amount,
        entry_type: EntryType::parse(&model.entry_type)
            .ok_or_else(|| corrupt("entry type", &model.entry_type))?,
        description: model.description,
        entry_date: model.entry_date.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn contract_model() -> contracts::Model {
        let now = Utc::now().into();
        contracts::Model {
            id: Uuid::now_v7(),
            lot_id: Uuid::now_v7(),
            applicant_id: Uuid::now_v7(),
            amount: dec!(12000),
            down_payment: dec!(2000),
            reserve_amount: Decimal::ZERO,
            payment_term_months: 10,
            financing_type: "direct".to_string(),
            status: "approved".to_string(),
            balance: dec!(-10000),
            rejection_reason: None,
            cancellation_note: None,
            approved_at: Some(now),
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_contract_model_maps_to_domain() {
        let model = contract_model();
        let contract = contract_from_model(model.clone()).unwrap();
        assert_eq!(contract.id.into_inner(), model.id);
        assert_eq!(contract.status, ContractStatus::Approved);
        assert_eq!(contract.financing_type, FinancingType::Direct);
        assert_eq!(contract.payment_term_months, 10);
        assert_eq!(contract.balance, dec!(-10000));
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let model = contracts::Model {
            status: "archived".to_string(),
            ..contract_model()
        };
        let err = contract_from_model(model).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(ref m) if m.contains("archived")));
    }

    #[test]
    fn test_negative_term_is_corrupt() {
        let model = contracts::Model {
            payment_term_months: -1,
            ..contract_model()
        };
        assert!(matches!(
            contract_from_model(model),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_entry_type_is_parsed() {
        let model = ledger_entries::Model {
            id: Uuid::now_v7(),
            contract_id: Uuid::now_v7(),
            payment_id: Some(Uuid::now_v7()),
            amount: dec!(-9.86),
            entry_type: "interest".to_string(),
            description: Some("Overdue interest".to_string()),
            entry_date: Utc::now().into(),
            created_at: Utc::now().into(),
        };
        let model_copy = model.clone();
        let entry = entry_from_model(model).unwrap();
        assert_eq!(entry.entry_type, EntryType::Interest);
        assert_eq!(entry.amount, dec!(-9.86));

        let bad = ledger_entries::Model {
            entry_type: "refund".to_string(),
            ..model_copy
        };
        assert!(entry_from_model(bad).is_err());
    }
}
