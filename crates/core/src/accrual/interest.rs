//! Simple interest arithmetic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Day-count basis for the annual rate.
pub const DAYS_PER_YEAR: i64 = 365;

/// Whole days elapsed since `due_date`, counted in 24-hour blocks.
///
/// Negative when `due_date` is still in the future.
#[must_use]
pub fn days_overdue(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - due_date).num_hours().div_euclid(24)
}

/// `principal × annual_rate × days / 365`, rounded to cents.
#[must_use]
pub fn simple_interest(principal: Decimal, annual_rate: Decimal, days: i64) -> Decimal {
    if days <= 0 {
        return Decimal::ZERO;
    }
    (principal * annual_rate * Decimal::from(days) / Decimal::from(DAYS_PER_YEAR)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(Duration::hours(23), 0)]
    #[case(Duration::hours(24), 1)]
    #[case(Duration::hours(47), 1)]
    #[case(Duration::days(30), 30)]
    #[case(Duration::hours(-1), -1)]
    fn test_days_overdue_floors(#[case] elapsed: Duration, #[case] expected: i64) {
        let due = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(days_overdue(due, due + elapsed), expected);
    }

    #[rstest]
    #[case(dec!(1000), dec!(0.12), 30, dec!(9.86))]
    #[case(dec!(1000), dec!(0.12), 365, dec!(120))]
    #[case(dec!(2500), dec!(0.18), 1, dec!(1.23))]
    #[case(dec!(1000), dec!(0.12), 0, dec!(0))]
    #[case(dec!(1000), dec!(0.12), -5, dec!(0))]
    fn test_simple_interest(
        #[case] principal: Decimal,
        #[case] rate: Decimal,
        #[case] days: i64,
        #[case] expected: Decimal,
    ) {
        assert_eq!(simple_interest(principal, rate, days), expected);
    }
}
