//! Worker pool backing the [`TaskQueue`] port.
//!
//! ```text
//! enqueue() ──try_send──▶ [bounded queue] ──▶ worker 0..n ──spawn──▶ task
//!     │                                                               │
//!     └── full: drop + warn                          failure: log, no retry
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use parcela_shared::config::WorkerConfig;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ports::{TaskFuture, TaskQueue};

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of workers draining the queue.
    pub workers: usize,
    /// Tasks buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

impl From<&WorkerConfig> for WorkerPoolConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
        }
    }
}

struct Job {
    label: &'static str,
    task: TaskFuture,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// Fixed-size pool of tokio workers fed by a bounded queue.
///
/// Delivery is at-most-once. A full queue drops the task, and a failed or
/// panicking task is logged and forgotten.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Starts the workers. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(config: WorkerPoolConfig) -> Self {
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&rx))))
            .collect();

        info!(workers, capacity = config.queue_capacity, "Worker pool started");
        Self {
            sender: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Stops accepting tasks, lets the workers drain the queue, and waits for them.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker terminated abnormally");
            }
        }
        info!("Worker pool stopped");
    }
}

impl TaskQueue for WorkerPool {
    fn enqueue(&self, label: &'static str, task: TaskFuture) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            warn!(task = label, "Worker pool is shut down, dropping task");
            return false;
        };
        match sender.try_send(Job { label, task }) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(task = job.label, "Worker queue full, dropping task");
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(task = job.label, "Worker queue closed, dropping task");
                false
            }
        }
    }
}

async fn worker_loop(id: usize, rx: SharedReceiver) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(Job { label, task }) = job else {
            debug!(worker = id, "Worker exiting");
            return;
        };

        match tokio::spawn(task).await {
            Ok(Ok(())) => debug!(worker = id, task = label, "Task completed"),
            Ok(Err(e)) => error!(worker = id, task = label, error = %e, "Task failed"),
            Err(e) => error!(worker = id, task = label, error = %e, "Task panicked"),
        }
    }
}
