//! Asynchronous task submission port.

use futures::future::BoxFuture;

/// Error type returned by background tasks.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of deferred work.
pub type TaskFuture = BoxFuture<'static, Result<(), TaskError>>;

/// Accepts fire-and-forget work.
///
/// Delivery is at-most-once: a task may be dropped when the queue is full
/// and a failed task is logged, never retried. Nothing correctness-critical
/// may go through here.
pub trait TaskQueue: Send + Sync {
    /// Queues `task` without blocking. Returns false if it was dropped.
    fn enqueue(&self, label: &'static str, task: TaskFuture) -> bool;
}
