//! Payment reconciliation and excess reallocation.

pub mod engine;
pub mod policy;

#[cfg(test)]
mod policy_props;

pub use engine::{ReconciliationEngine, ReconciliationOutcome};
pub use policy::{
    ReallocationPlan, ReallocationPolicy, ReallocationStep, ReduceInstallments, ShortenTerm,
};
