//! Core business logic for Parcela.
//!
//! This crate holds the financing engine with ZERO web or database
//! dependencies: contracts and payments, their state machines, the signed
//! ledger, schedule generation, reconciliation, and interest accrual.
//! Persistence, notifications, audit, and background work are reached
//! through the traits in [`ports`].
//!
//! # Modules
//!
//! - `fsm` - Table-driven state machine plumbing
//! - `contract` - Contracts, lots, and the contract state machine
//! - `payment` - Payments and the payment state machine
//! - `ledger` - Signed ledger entries, balances, and the interest upsert
//! - `schedule` - Payment schedule generation
//! - `reconciliation` - Applying received funds and reallocating excess
//! - `accrual` - Overdue interest accrual job
//! - `lifecycle` - The orchestrator request handlers and the scheduler call
//! - `ports` - Traits for the external collaborators
//! - `store` - In-memory store implementation
//! - `worker` - Bounded background worker pool

pub mod accrual;
pub mod contract;
pub mod error;
pub mod fsm;
pub mod ledger;
pub mod lifecycle;
pub mod payment;
pub mod ports;
pub mod reconciliation;
pub mod schedule;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{LifecycleError, LifecycleResult};
