//! Store implementations shipped with the core.
//!
//! The Postgres store lives in `parcela-db`; this in-memory one backs tests
//! and local runs.

pub mod memory;

pub use memory::{InMemoryStore, MemoryTx};
