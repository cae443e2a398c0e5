//! Payment schedule generation.
//!
//! Turns contract terms into the ordered list of payments created on
//! approval. Generation is pure: the same terms and anchor always yield the
//! same schedule.

pub mod generator;

#[cfg(test)]
mod generator_props;

pub use generator::{
    ScheduleError, ScheduleOffsets, ScheduleTerms, ScheduledPayment, generate, split_installments,
};
