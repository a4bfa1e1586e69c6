//! # Task runner
//!
//! Owns the queue, the worker pool, and the reaper. `Runner::start` runs
//! the startup recovery protocol before accepting new submissions —
//! re-enqueuing rows left `Pending` and resetting-then-re-enqueuing rows
//! stuck `Processing` — then spawns the reaper loop alongside the worker
//! pool. `submit` is the only public write path into the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::RuntimeResult;
use crate::pool::WorkerPool;
use crate::queue::{QueuedTask, TaskQueue};
use crate::store::TaskStore;
use crate::task::{Task, TaskRow, TaskStatus};

/// How a `Task` trait object for a recovered row gets rebuilt — the
/// runner itself has no idea what a `memo_generation` payload means, so
/// rehydration is delegated to whoever constructed the `Runner`
/// (`memoq-worker`'s task factory, in production).
pub trait TaskRehydrator: Send + Sync {
    fn rehydrate(&self, row: &TaskRow) -> Option<Box<dyn Task>>;
}

/// The durable task runner: bounded queue, worker pool, and stuck-task
/// reaper wired together and running.
pub struct Runner {
    queue: TaskQueue,
    store: Arc<dyn TaskStore>,
    rehydrator: Arc<dyn TaskRehydrator>,
    cancel: CancellationToken,
    // `Option` + async `Mutex` rather than owned fields so `join` can take
    // them out through `&self` — callers hold the `Runner` behind an `Arc`
    // (shared with the event handler that submits to it), so a
    // by-value-consuming `join` would be unreachable at shutdown.
    pool: tokio::sync::Mutex<Option<WorkerPool>>,
    reaper_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Runner {
    /// Run recovery — every `Processing` row is reset to `Pending` and
    /// re-queued — then spawn the worker pool and the reaper loop.
    pub async fn start(
        store: Arc<dyn TaskStore>,
        rehydrator: Arc<dyn TaskRehydrator>,
        worker_count: usize,
        queue_size: usize,
        stuck_task_age: Duration,
        stuck_check_interval: Duration,
    ) -> RuntimeResult<Self> {
        let cancel = CancellationToken::new();
        let (queue, receiver) = TaskQueue::bounded(queue_size);

        recover(&store, &queue, rehydrator.as_ref()).await?;

        let pool = WorkerPool::spawn(worker_count, receiver, Arc::clone(&store), cancel.clone());
        let reaper_handle = spawn_reaper(
            Arc::clone(&store),
            queue.clone(),
            Arc::clone(&rehydrator),
            stuck_task_age,
            stuck_check_interval,
            cancel.clone(),
        );

        Ok(Self {
            queue,
            store,
            rehydrator,
            cancel,
            pool: tokio::sync::Mutex::new(Some(pool)),
            reaper_handle: tokio::sync::Mutex::new(Some(reaper_handle)),
        })
    }

    /// Submit a brand-new task: persist its row as `Pending`, then enqueue
    /// it. If the queue is full the row is left `Pending` in the store and
    /// the caller sees `QueueFull` — the task is not lost, only delayed:
    /// the next reaper pass or restart recovery will pick it up, keeping
    /// delivery at-least-once.
    pub async fn submit(&self, task: Box<dyn Task>) -> RuntimeResult<()> {
        let row = TaskRow::new_pending(task.id(), task.task_type(), task.payload());
        self.store.save(row.clone()).await?;
        self.queue.try_submit(QueuedTask { row, task })
    }

    /// Rehydrate and submit a row that's already `Pending` in the store
    /// (used by callers who persisted the row themselves, e.g. inside a
    /// larger transaction, and only need the in-memory queue touched).
    pub fn submit_row(&self, row: TaskRow) -> RuntimeResult<()> {
        match self.rehydrator.rehydrate(&row) {
            Some(task) => self.queue.try_submit(QueuedTask { row, task }),
            None => {
                tracing::error!(task_id = %row.id, task_type = %row.task_type, "no rehydrator for task type");
                Ok(())
            }
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal graceful shutdown: the queue stops accepting new
    /// submissions, workers finish in-flight tasks, and the reaper loop
    /// exits. Call `join` afterwards to wait for both.
    pub fn stop(&self) {
        self.queue.close();
        self.cancel.cancel();
    }

    /// Wait for the worker pool and the reaper loop to exit. Idempotent —
    /// calling it more than once (or concurrently) is safe, later callers
    /// just see an already-empty slot and return immediately.
    pub async fn join(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.join().await;
        }
        if let Some(handle) = self.reaper_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn recover(
    store: &Arc<dyn TaskStore>,
    queue: &TaskQueue,
    rehydrator: &dyn TaskRehydrator,
) -> RuntimeResult<()> {
    // Rows left `Pending` — e.g. `save` succeeded but the process died
    // before the in-memory enqueue, or a prior recovery pass skipped them
    // because the queue was full — get a plain re-enqueue, no status
    // write (they're already at the right status).
    let pending = store.get_pending().await?;
    for row in pending {
        if let Some(task) = rehydrator.rehydrate(&row) {
            if let Err(err) = queue.try_submit(QueuedTask { row: row.clone(), task }) {
                tracing::warn!(task_id = %row.id, error = %err, "could not re-queue pending task on startup, left pending for later pickup");
            }
        } else {
            tracing::error!(task_id = %row.id, task_type = %row.task_type, "no rehydrator for pending task, leaving pending");
        }
    }

    // Rows stuck `Processing` from a crash mid-execute are reset to
    // `Pending` and re-driven regardless of age.
    let stuck = store.get_processing(Duration::ZERO).await?;
    for row in stuck {
        requeue(store, queue, rehydrator, row).await;
    }
    Ok(())
}

async fn requeue(
    store: &Arc<dyn TaskStore>,
    queue: &TaskQueue,
    rehydrator: &dyn TaskRehydrator,
    mut row: TaskRow,
) {
    row.status = TaskStatus::Pending;
    if let Err(err) = store.update_status(row.id, TaskStatus::Pending, None).await {
        tracing::error!(task_id = %row.id, error = %err, "failed to reset stuck task to pending");
        return;
    }

    let Some(task) = rehydrator.rehydrate(&row) else {
        tracing::error!(task_id = %row.id, task_type = %row.task_type, "no rehydrator for recovered task, leaving pending");
        return;
    };

    if let Err(err) = queue.try_submit(QueuedTask { row: row.clone(), task }) {
        tracing::warn!(task_id = %row.id, error = %err, "could not re-queue recovered task immediately, left pending for later pickup");
    }
}

fn spawn_reaper(
    store: Arc<dyn TaskStore>,
    queue: TaskQueue,
    rehydrator: Arc<dyn TaskRehydrator>,
    stuck_task_age: Duration,
    stuck_check_interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(stuck_check_interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("reaper loop exiting");
                    return;
                }
                _ = interval.tick() => {
                    match store.get_processing(stuck_task_age).await {
                        Ok(stuck) => {
                            if !stuck.is_empty() {
                                tracing::warn!(count = stuck.len(), "reaper found stuck tasks, requeueing");
                            }
                            for row in stuck {
                                requeue(&store, &queue, rehydrator.as_ref(), row).await;
                            }
                        }
                        Err(err) => tracing::error!(error = %err, "reaper pass failed to list processing tasks"),
                    }
                }
            }
        }
    })
}
