//! # Bounded, non-blocking task queue
//!
//! Thin wrapper over `tokio::sync::mpsc::channel` sized at construction.
//! `try_send` never blocks: a full queue surfaces as `RuntimeError::QueueFull`
//! immediately rather than making the caller wait.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::task::TaskRow;

/// An enqueued unit: the durable row plus the live `Task` object that will
/// actually run it. Kept together so a worker pulling off the queue has
/// both what to persist and what to execute without a second lookup.
pub struct QueuedTask {
    pub row: TaskRow,
    pub task: Box<dyn crate::task::Task>,
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask")
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<QueuedTask>,
    closed: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct TaskQueueReceiver {
    rx: mpsc::Receiver<QueuedTask>,
}

impl TaskQueue {
    /// Build a bounded channel of `capacity` slots and split it into its
    /// producer/consumer halves.
    pub fn bounded(capacity: usize) -> (Self, TaskQueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            TaskQueueReceiver { rx },
        )
    }

    /// Enqueue without waiting. Returns `QueueFull` immediately if the
    /// channel's buffer is saturated, `QueueClosed` if `close` has been
    /// called or every receiver has been dropped (runner shut down).
    pub fn try_submit(&self, item: QueuedTask) -> RuntimeResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RuntimeError::QueueClosed);
        }
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RuntimeError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => RuntimeError::QueueClosed,
        })
    }

    /// Stop accepting new submissions. Safe to call more than once or
    /// concurrently from multiple clones — the first caller logs it, the
    /// rest are no-ops. Already-queued items are still handed to workers;
    /// this only rejects what comes in after.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("task queue closed");
        }
    }
}

impl TaskQueueReceiver {
    pub async fn recv(&mut self) -> Option<QueuedTask> {
        self.rx.recv().await
    }
}
