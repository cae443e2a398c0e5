//! Initial database migration.
//!
//! Creates the lot, applicant, contract, payment, and ledger tables plus the
//! audit and notification sinks.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: REFERENCED ENTITIES
        // ============================================================
        db.execute_unprepared(LOTS_SQL).await?;
        db.execute_unprepared(APPLICANTS_SQL).await?;

        // ============================================================
        // PART 2: CONTRACTS & PAYMENTS
        // ============================================================
        db.execute_unprepared(CONTRACTS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;

        // ============================================================
        // PART 3: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;

        // ============================================================
        // PART 4: AUDIT & NOTIFICATIONS
        // ============================================================
        db.execute_unprepared(AUDIT_LOGS_SQL).await?;
        db.execute_unprepared(NOTIFICATIONS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const LOTS_SQL: &str = r"
CREATE TABLE lots (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(50) NOT NULL UNIQUE,
    status VARCHAR(20) NOT NULL DEFAULT 'available',
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_lot_status CHECK (status IN ('available', 'reserved', 'paid'))
);
";

const APPLICANTS_SQL: &str = r"
CREATE TABLE applicants (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    full_name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CONTRACTS_SQL: &str = r"
CREATE TABLE contracts (
    id UUID PRIMARY KEY,
    lot_id UUID NOT NULL REFERENCES lots(id),
    applicant_id UUID NOT NULL REFERENCES applicants(id),
    amount NUMERIC(19, 4) NOT NULL,
    down_payment NUMERIC(19, 4) NOT NULL DEFAULT 0,
    reserve_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    payment_term_months INTEGER NOT NULL,
    financing_type VARCHAR(20) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    rejection_reason TEXT,
    cancellation_note TEXT,
    approved_at TIMESTAMPTZ,
    closed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_contract_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_contract_portions CHECK (
        down_payment >= 0 AND reserve_amount >= 0 AND down_payment + reserve_amount <= amount
    ),
    CONSTRAINT chk_contract_term CHECK (payment_term_months BETWEEN 0 AND 600),
    CONSTRAINT chk_contract_financing CHECK (financing_type IN ('direct', 'bank')),
    CONSTRAINT chk_contract_status CHECK (
        status IN ('pending', 'submitted', 'approved', 'rejected', 'cancelled', 'closed')
    )
);

CREATE INDEX idx_contracts_lot ON contracts(lot_id);
CREATE INDEX idx_contracts_applicant ON contracts(applicant_id);
CREATE INDEX idx_contracts_status ON contracts(status);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    contract_id UUID NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    amount NUMERIC(19, 4) NOT NULL,
    paid_amount NUMERIC(19, 4),
    interest_amount NUMERIC(19, 4),
    due_date TIMESTAMPTZ NOT NULL,
    payment_date TIMESTAMPTZ,
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    payment_type VARCHAR(20) NOT NULL,
    receipt_ref VARCHAR(500),
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_payment_paid_amount CHECK (paid_amount IS NULL OR status = 'paid'),
    CONSTRAINT chk_payment_status CHECK (
        status IN ('pending', 'submitted', 'paid', 'rejected', 'readjustment')
    ),
    CONSTRAINT chk_payment_type CHECK (
        payment_type IN (
            'reservation', 'down_payment', 'installment', 'full', 'advance', 'capital_repayment'
        )
    )
);

CREATE INDEX idx_payments_contract_due ON payments(contract_id, due_date);
CREATE INDEX idx_payments_overdue ON payments(due_date) WHERE status = 'pending';
";

// payment_id carries no foreign key: reallocation deletes installments whose
// interest entries must stay on the ledger.
const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    contract_id UUID NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    payment_id UUID,
    amount NUMERIC(19, 4) NOT NULL,
    entry_type VARCHAR(20) NOT NULL,
    description TEXT,
    entry_date TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_nonzero CHECK (amount <> 0),
    CONSTRAINT chk_entry_type CHECK (
        entry_type IN ('initial', 'payment', 'interest', 'prepayment', 'adjustment')
    ),
    CONSTRAINT chk_entry_sign CHECK (
        (entry_type IN ('initial', 'interest') AND amount < 0)
        OR (entry_type IN ('payment', 'prepayment') AND amount > 0)
        OR entry_type = 'adjustment'
    )
);

CREATE INDEX idx_le_contract ON ledger_entries(contract_id, created_at);
CREATE INDEX idx_le_payment ON ledger_entries(payment_id);
CREATE UNIQUE INDEX uq_le_payment_interest ON ledger_entries(payment_id)
    WHERE entry_type = 'interest';
";

const AUDIT_LOGS_SQL: &str = r"
CREATE TABLE audit_logs (
    id UUID PRIMARY KEY,
    actor_id UUID NOT NULL,
    action VARCHAR(50) NOT NULL,
    entity VARCHAR(50) NOT NULL,
    entity_id UUID NOT NULL,
    details JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_entity ON audit_logs(entity, entity_id);
CREATE INDEX idx_audit_actor ON audit_logs(actor_id, created_at);
";

const NOTIFICATIONS_SQL: &str = r"
CREATE TABLE notifications (
    id UUID PRIMARY KEY,
    user_id UUID,
    audience VARCHAR(20) NOT NULL,
    title VARCHAR(255) NOT NULL,
    message TEXT NOT NULL,
    kind VARCHAR(20) NOT NULL,
    read_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_notification_audience CHECK (
        (audience = 'user' AND user_id IS NOT NULL) OR (audience = 'admins' AND user_id IS NULL)
    )
);

CREATE INDEX idx_notifications_user ON notifications(user_id, created_at) WHERE read_at IS NULL;
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS notifications;
DROP TABLE IF EXISTS audit_logs;
DROP TABLE IF EXISTS ledger_entries;
DROP TABLE IF EXISTS payments;
DROP TABLE IF EXISTS contracts;
DROP TABLE IF EXISTS applicants;
DROP TABLE IF EXISTS lots;
";
