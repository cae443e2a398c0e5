//! Schedule generator.

use chrono::{DateTime, Duration, Months, Utc};
use parcela_shared::config::ScheduleConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payment::PaymentType;

/// The contract terms a schedule is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTerms {
    /// Principal financed.
    pub amount: Decimal,
    /// Down payment portion.
    pub down_payment: Decimal,
    /// Reservation portion.
    pub reserve_amount: Decimal,
    /// Number of monthly installments (0 = single full payment).
    pub payment_term_months: u32,
}

impl ScheduleTerms {
    /// What is left to finance after the reservation and down payment.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.amount - self.reserve_amount - self.down_payment
    }
}

/// Day offsets for the one-off payments, counted from the approval anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOffsets {
    /// Days until the reservation is due.
    pub reservation_due_days: i64,
    /// Days until the down payment is due when there is no reservation.
    pub down_payment_due_days: i64,
    /// Days until the down payment is due when a reservation precedes it.
    pub down_payment_after_reservation_days: i64,
}

impl Default for ScheduleOffsets {
    fn default() -> Self {
        Self {
            reservation_due_days: 7,
            down_payment_due_days: 14,
            down_payment_after_reservation_days: 21,
        }
    }
}

impl From<&ScheduleConfig> for ScheduleOffsets {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            reservation_due_days: config.reservation_due_days,
            down_payment_due_days: config.down_payment_due_days,
            down_payment_after_reservation_days: config.down_payment_after_reservation_days,
        }
    }
}

/// One row of a generated schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    /// Position in the schedule, starting at 0.
    pub sequence: u32,
    /// What the payment is for.
    pub payment_type: PaymentType,
    /// Principal due.
    pub amount: Decimal,
    /// When it is due.
    pub due_date: DateTime<Utc>,
}

/// Errors that can occur while generating a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The contract amount must be positive.
    #[error("Contract amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Reservation plus down payment exceed the contract amount.
    #[error("Reserve and down payment exceed the contract amount by {0}")]
    NegativeRemaining(Decimal),

    /// A due date fell outside the representable calendar.
    #[error("Due date out of range for installment {0}")]
    DateOverflow(u32),
}

/// Splits `remaining` into `term` installment amounts.
///
/// The base share is `floor(remaining / term)`; the first installment takes
/// whatever the floor left behind so the shares sum to `remaining` exactly.
#[must_use]
pub fn split_installments(remaining: Decimal, term: u32) -> Vec<Decimal> {
    if term == 0 || remaining <= Decimal::ZERO {
        return Vec::new();
    }
    let count = Decimal::from(term);
    let base = (remaining / count).floor();
    let first = remaining - base * (count - Decimal::ONE);

    let mut shares = Vec::with_capacity(term as usize);
    shares.push(first);
    shares.extend(std::iter::repeat_n(base, term as usize - 1));
    shares
}

fn add_months(anchor: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>, ScheduleError> {
    anchor
        .checked_add_months(Months::new(months))
        .ok_or(ScheduleError::DateOverflow(months))
}

/// Builds the payment schedule for `terms`, anchored at approval time.
///
/// 1. A `reservation` payment if `reserve_amount > 0`.
/// 2. A `down_payment` if `down_payment > 0`, due later when a reservation exists.
/// 3. `term` monthly `installment`s over the remainder, the first due one
///    month after the anchor, or a single `full` payment when `term == 0`.
///
/// Installments whose share floors to zero are left out.
pub fn generate(
    terms: &ScheduleTerms,
    offsets: &ScheduleOffsets,
    anchor: DateTime<Utc>,
) -> Result<Vec<ScheduledPayment>, ScheduleError> {
    if terms.amount <= Decimal::ZERO {
        return Err(ScheduleError::NonPositiveAmount(terms.amount));
    }
    let remaining = terms.remaining();
    if remaining < Decimal::ZERO {
        return Err(ScheduleError::NegativeRemaining(-remaining));
    }

    let mut rows: Vec<(PaymentType, Decimal, DateTime<Utc>)> = Vec::new();

    let has_reservation = terms.reserve_amount > Decimal::ZERO;
    if has_reservation {
        rows.push((
            PaymentType::Reservation,
            terms.reserve_amount,
            anchor + Duration::days(offsets.reservation_due_days),
        ));
    }

    if terms.down_payment > Decimal::ZERO {
        let days = if has_reservation {
            offsets.down_payment_after_reservation_days
        } else {
            offsets.down_payment_due_days
        };
        rows.push((
            PaymentType::DownPayment,
            terms.down_payment,
            anchor + Duration::days(days),
        ));
    }

    if remaining > Decimal::ZERO {
        if terms.payment_term_months == 0 {
            rows.push((PaymentType::Full, remaining, add_months(anchor, 1)?));
        } else {
            for (i, share) in (1u32..).zip(split_installments(remaining, terms.payment_term_months))
            {
                if share.is_zero() {
                    continue;
                }
                rows.push((PaymentType::Installment, share, add_months(anchor, i)?));
            }
        }
    }

    Ok((0u32..)
        .zip(rows)
        .map(|(sequence, (payment_type, amount, due_date))| ScheduledPayment {
            sequence,
            payment_type,
            amount,
            due_date,
        })
        .collect())
}
