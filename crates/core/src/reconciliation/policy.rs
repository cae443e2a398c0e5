//! Reallocation policies.
//!
//! A policy decides how an excess amount is absorbed by the remaining
//! installments. It only produces a plan; the engine applies it.

use parcela_shared::types::PaymentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::payment::Payment;

/// One edit to a future installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReallocationStep {
    /// The installment is fully covered and removed from the schedule.
    Delete {
        /// The installment removed.
        payment_id: PaymentId,
        /// Principal it carried.
        amount: Decimal,
    },
    /// The installment is partly covered and its principal shrinks.
    Reduce {
        /// The installment reduced.
        payment_id: PaymentId,
        /// Principal before.
        from: Decimal,
        /// Principal after.
        to: Decimal,
    },
}

impl ReallocationStep {
    /// The installment this step touches.
    #[must_use]
    pub fn payment_id(&self) -> PaymentId {
        match self {
            Self::Delete { payment_id, .. } | Self::Reduce { payment_id, .. } => *payment_id,
        }
    }

    /// Principal this step absorbs.
    #[must_use]
    pub fn absorbed(&self) -> Decimal {
        match self {
            Self::Delete { amount, .. } => *amount,
            Self::Reduce { from, to, .. } => *from - *to,
        }
    }
}

/// The edits a policy wants applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReallocationPlan {
    /// Edits, in the order they should be applied.
    pub steps: Vec<ReallocationStep>,
    /// Excess left over once every candidate was exhausted.
    pub unapplied: Decimal,
}

impl ReallocationPlan {
    /// Total principal absorbed by the plan.
    #[must_use]
    pub fn absorbed(&self) -> Decimal {
        self.steps.iter().map(ReallocationStep::absorbed).sum()
    }

    /// Number of installments deleted.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, ReallocationStep::Delete { .. }))
            .count()
    }
}

/// Strategy for absorbing excess funds into the remaining schedule.
///
/// `candidates` are the contract's open installments ordered by due date
/// ascending. Excess is matched against principal (`amount`) only; interest
/// already charged on a candidate is not considered.
pub trait ReallocationPolicy: Send + Sync {
    /// Policy name for logs and audit details.
    fn name(&self) -> &'static str;

    /// Plans how `excess` is absorbed by `candidates`.
    fn plan(&self, candidates: &[Payment], excess: Decimal) -> ReallocationPlan;
}

/// Pays off the schedule from the end, shortening the term.
///
/// Walks candidates latest-first, deleting each one the excess fully covers
/// and reducing the first one it only partly covers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortenTerm;

impl ReallocationPolicy for ShortenTerm {
    fn name(&self) -> &'static str {
        "shorten_term"
    }

    fn plan(&self, candidates: &[Payment], excess: Decimal) -> ReallocationPlan {
        let mut remaining = excess;
        let mut steps = Vec::new();

        for candidate in candidates.iter().rev() {
            if remaining <= Decimal::ZERO {
                break;
            }
            if remaining >= candidate.amount {
                steps.push(ReallocationStep::Delete {
                    payment_id: candidate.id,
                    amount: candidate.amount,
                });
                remaining -= candidate.amount;
            } else {
                steps.push(ReallocationStep::Reduce {
                    payment_id: candidate.id,
                    from: candidate.amount,
                    to: candidate.amount - remaining,
                });
                remaining = Decimal::ZERO;
            }
        }

        ReallocationPlan {
            steps,
            unapplied: remaining.max(Decimal::ZERO),
        }
    }
}

/// Keeps the term and shrinks every remaining installment evenly.
///
/// The excess is spread in whole-unit shares; whatever cannot be split
/// evenly goes to the latest installments first. An installment brought to
/// zero is deleted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReduceInstallments;

impl ReallocationPolicy for ReduceInstallments {
    fn name(&self) -> &'static str {
        "reduce_installments"
    }

    fn plan(&self, candidates: &[Payment], excess: Decimal) -> ReallocationPlan {
        let mut current: Vec<Decimal> = candidates.iter().map(|c| c.amount).collect();
        let mut remaining = excess.max(Decimal::ZERO);

        loop {
            let active: Vec<usize> = (0..current.len())
                .filter(|&i| current[i] > Decimal::ZERO)
                .collect();
            if active.is_empty() || remaining.is_zero() {
                break;
            }

            let share = (remaining / Decimal::from(active.len())).floor();
            if share.is_zero() {
                for &i in active.iter().rev() {
                    let take = remaining.min(Decimal::ONE).min(current[i]);
                    current[i] -= take;
                    remaining -= take;
                    if remaining.is_zero() {
                        break;
                    }
                }
                continue;
            }

            for &i in &active {
                let take = share.min(current[i]);
                current[i] -= take;
                remaining -= take;
            }
        }

        let steps = candidates
            .iter()
            .zip(current)
            .rev()
            .filter(|(c, after)| c.amount != *after)
            .map(|(c, after)| {
                if after.is_zero() {
                    ReallocationStep::Delete {
                        payment_id: c.id,
                        amount: c.amount,
                    }
                } else {
                    ReallocationStep::Reduce {
                        payment_id: c.id,
                        from: c.amount,
                        to: after,
                    }
                }
            })
            .collect();

        ReallocationPlan {
            steps,
            unapplied: remaining,
        }
    }
}
