//! Property-based tests for the schedule generator.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::generator::{ScheduleOffsets, ScheduleTerms, generate, split_installments};
use crate::payment::PaymentType;

/// Whole-unit amounts up to 10,000,000.
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(Decimal::from)
}

/// Terms where reserve + down never exceed the amount.
fn terms_strategy() -> impl Strategy<Value = ScheduleTerms> {
    (amount_strategy(), 0u32..=100, 0u32..=100, 0u32..=360).prop_map(
        |(amount, down_pct, reserve_pct, term)| {
            let down = (amount * Decimal::from(down_pct) / Decimal::from(200)).floor();
            let reserve = (amount * Decimal::from(reserve_pct) / Decimal::from(200)).floor();
            ScheduleTerms {
                amount,
                down_payment: down,
                reserve_amount: reserve,
                payment_term_months: term,
            }
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Reservation, down payment, and installments always add up to the amount.
    #[test]
    fn prop_schedule_sums_to_amount(terms in terms_strategy()) {
        let anchor = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let schedule = generate(&terms, &ScheduleOffsets::default(), anchor).unwrap();
        let total: Decimal = schedule.iter().map(|p| p.amount).sum();
        prop_assert_eq!(total, terms.amount);
        prop_assert!(schedule.iter().all(|p| p.amount > Decimal::ZERO));
    }

    /// Installment due dates strictly increase.
    #[test]
    fn prop_installments_strictly_ordered(terms in terms_strategy()) {
        let anchor = Utc.with_ymd_and_hms(2026, 1, 31, 9, 30, 0).unwrap();
        let schedule = generate(&terms, &ScheduleOffsets::default(), anchor).unwrap();
        let dues: Vec<_> = schedule
            .iter()
            .filter(|p| p.payment_type == PaymentType::Installment)
            .map(|p| p.due_date)
            .collect();
        prop_assert!(dues.windows(2).all(|w| w[0] < w[1]));
    }

    /// Only the first share can differ from the base, and never by a whole term.
    #[test]
    fn prop_split_is_even_except_first(
        remaining in amount_strategy(),
        term in 1u32..=600,
    ) {
        let shares = split_installments(remaining, term);
        prop_assert_eq!(shares.len(), term as usize);
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), remaining);
        let base = shares[shares.len() - 1];
        prop_assert!(shares[1..].iter().all(|s| *s == base));
        prop_assert!(shares[0] >= base);
        prop_assert!(shares[0] - base < Decimal::from(term));
    }

    /// Identical inputs yield identical output.
    #[test]
    fn prop_generation_is_deterministic(terms in terms_strategy()) {
        let anchor = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
        let a = generate(&terms, &ScheduleOffsets::default(), anchor).unwrap();
        let b = generate(&terms, &ScheduleOffsets::default(), anchor).unwrap();
        prop_assert_eq!(a, b);
    }
}
