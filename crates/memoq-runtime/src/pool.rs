//! # Worker pool
//!
//! A fixed number of long-lived tokio tasks pull `QueuedTask`s off a shared
//! `TaskQueueReceiver` and drive each one to completion, persisting its
//! outcome. A panic inside a task's `execute` is caught with
//! `catch_unwind` so it cannot take the whole worker loop down — it is
//! recorded as a normal `Failed` outcome instead.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};
use crate::queue::{QueuedTask, TaskQueueReceiver};
use crate::store::TaskStore;
use crate::task::{Task, TaskStatus};

/// Invoked whenever a worker's `execute` call returns an error, after the
/// row has already been marked `Failed`. Defaults to log-and-drop; an
/// embedder can register its own (metrics, paging, whatever) without the
/// pool knowing about it.
pub type ErrorHandler = Arc<dyn Fn(&dyn Task, &RuntimeError) + Send + Sync>;

fn default_error_handler() -> ErrorHandler {
    Arc::new(|task, err| {
        tracing::warn!(task_id = %task.id(), task_type = task.task_type(), error = %err, "task failed");
    })
}

/// Spawns `worker_count` loops, each repeatedly pulling from `receiver`
/// and running the task to completion. `cancel` fires on shutdown:
/// workers finish whatever they're mid-execute on, then stop pulling new
/// work.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        worker_count: usize,
        receiver: TaskQueueReceiver,
        store: Arc<dyn TaskStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self::spawn_with_error_handler(
            worker_count,
            receiver,
            store,
            cancel,
            default_error_handler(),
        )
    }

    /// Same as `spawn`, but with a caller-supplied error handler in place
    /// of the default log-and-drop closure.
    pub fn spawn_with_error_handler(
        worker_count: usize,
        receiver: TaskQueueReceiver,
        store: Arc<dyn TaskStore>,
        cancel: CancellationToken,
        on_error: ErrorHandler,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            let on_error = Arc::clone(&on_error);
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, receiver, store, cancel, on_error).await;
            }));
        }
        Self { handles }
    }

    /// Wait for every worker loop to exit (used by graceful shutdown,
    /// after the queue's sender half has been dropped and `cancel` fired).
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "worker task join failed");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<TaskQueueReceiver>>,
    store: Arc<dyn TaskStore>,
    cancel: CancellationToken,
    on_error: ErrorHandler,
) {
    loop {
        let next = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };

        let Some(QueuedTask { row, task }) = next else {
            tracing::debug!(worker_id, "worker loop exiting");
            return;
        };

        if let Err(err) = store
            .update_status(row.id, TaskStatus::Processing, None)
            .await
        {
            tracing::error!(worker_id, task_id = %row.id, error = %err, "failed to mark task processing, skipping execution; the reaper will pick it up");
            continue;
        }

        let outcome = run_task_catching_panics(task.as_ref(), &cancel).await;

        match outcome {
            Ok(()) => {
                if let Err(err) = store
                    .update_status(row.id, TaskStatus::Completed, None)
                    .await
                {
                    tracing::error!(worker_id, task_id = %row.id, error = %err, "failed to mark task completed");
                }
            }
            Err(err) => {
                if let Err(store_err) = store
                    .update_status(row.id, TaskStatus::Failed, Some(err.to_string()))
                    .await
                {
                    tracing::error!(worker_id, task_id = %row.id, error = %store_err, "failed to mark task failed");
                }
                on_error(task.as_ref(), &err);
            }
        }
    }
}

/// Run `task.execute` with a grace period so a runaway implementation
/// cannot hang a worker forever, and catch panics so they surface as a
/// `Failed` status rather than unwinding the worker loop.
async fn run_task_catching_panics(
    task: &dyn crate::task::Task,
    cancel: &CancellationToken,
) -> RuntimeResult<()> {
    let fut = AssertUnwindSafe(task.execute(cancel)).catch_unwind();
    match fut.await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(&panic);
            Err(crate::error::RuntimeError::TaskPanicked(message))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Small helper the `Runner` uses to decide how long to wait for in-flight
/// workers to drain during graceful shutdown before giving up.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
