//! Overdue interest accrual.
//!
//! A periodic pass charging simple interest on overdue principal. Each run
//! overwrites the single interest entry per payment, so re-running on the
//! same day charges nothing new.

pub mod interest;
pub mod job;

pub use interest::{DAYS_PER_YEAR, days_overdue, simple_interest};
pub use job::{AccrualJob, AccrualReport, AccrualSettings};
