//! Property-based tests for reallocation policies.

use chrono::{Duration, TimeZone, Utc};
use parcela_shared::types::ContractId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::policy::{ReallocationPolicy, ReallocationStep, ReduceInstallments, ShortenTerm};
use crate::payment::{Payment, PaymentType};

fn candidates_strategy() -> impl Strategy<Value = Vec<Payment>> {
    prop::collection::vec(1i64..50_000i64, 0..40).prop_map(|amounts| {
        let contract_id = ContractId::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        (0i64..)
            .zip(amounts)
            .map(|(i, a)| {
                Payment::scheduled(
                    contract_id,
                    PaymentType::Installment,
                    Decimal::new(a, 1),
                    start + Duration::days(30 * i),
                )
            })
            .collect()
    })
}

fn excess_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..2_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn check_conserves(policy: &dyn ReallocationPolicy, candidates: &[Payment], excess: Decimal) {
    let plan = policy.plan(candidates, excess);
    assert_eq!(plan.absorbed() + plan.unapplied, excess);

    let total: Decimal = candidates.iter().map(|c| c.amount).sum();
    if excess <= total {
        assert_eq!(plan.unapplied, Decimal::ZERO);
    }

    for step in &plan.steps {
        let candidate = candidates
            .iter()
            .find(|c| c.id == step.payment_id())
            .expect("step refers to a candidate");
        match step {
            ReallocationStep::Delete { amount, .. } => assert_eq!(*amount, candidate.amount),
            ReallocationStep::Reduce { from, to, .. } => {
                assert_eq!(*from, candidate.amount);
                assert!(*to > Decimal::ZERO && *to < *from);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Absorbed plus unapplied always equals the excess.
    #[test]
    fn prop_shorten_term_conserves_excess(
        candidates in candidates_strategy(),
        excess in excess_strategy(),
    ) {
        check_conserves(&ShortenTerm, &candidates, excess);
    }

    #[test]
    fn prop_reduce_installments_conserves_excess(
        candidates in candidates_strategy(),
        excess in excess_strategy(),
    ) {
        check_conserves(&ReduceInstallments, &candidates, excess);
    }

    /// Shortening only ever touches a suffix of the schedule, with at most one reduce.
    #[test]
    fn prop_shorten_term_touches_a_suffix(
        candidates in candidates_strategy(),
        excess in excess_strategy(),
    ) {
        let plan = ShortenTerm.plan(&candidates, excess);
        let touched = plan.steps.len();
        let suffix: Vec<_> = candidates.iter().rev().take(touched).map(|c| c.id).collect();
        let ids: Vec<_> = plan.steps.iter().map(ReallocationStep::payment_id).collect();
        prop_assert_eq!(ids, suffix);
        let reduces = plan.steps.iter().filter(|s| matches!(s, ReallocationStep::Reduce { .. })).count();
        prop_assert!(reduces <= 1);
    }
}
