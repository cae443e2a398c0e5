//! Bounded background worker pool.

pub mod pool;

pub use pool::{WorkerPool, WorkerPoolConfig};
