//! # Event bus
//!
//! Fans a `TaskRequestEvent` out to every handler registered for its
//! `task_type` at the moment of emission. Handlers registered after an
//! event fires never see it — emission takes a snapshot of the
//! subscriber list before dispatching, so a handler registering itself
//! mid-fan-out cannot race the in-flight emission.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use memoq_shared::{EventPublisher, MemoqResult, TaskRequestEvent};
use tokio::sync::RwLock;

/// Handles one `TaskRequestEvent`, typically by building a `Task` and
/// submitting it to the `Runner`. Implemented per task type in
/// `memoq-worker`.
#[async_trait]
pub trait TaskRequestHandler: Send + Sync {
    async fn handle(&self, event: TaskRequestEvent) -> MemoqResult<()>;
}

#[derive(Debug, Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn TaskRequestHandler>>>>,
}

impl std::fmt::Debug for dyn TaskRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<task request handler>")
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` to be invoked for every future event whose
    /// `task_type` equals `task_type`.
    pub async fn subscribe(&self, task_type: impl Into<String>, handler: Arc<dyn TaskRequestHandler>) {
        self.handlers
            .write()
            .await
            .entry(task_type.into())
            .or_default()
            .push(handler);
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    /// Invoke every handler registered for `event.task_type`, in
    /// registration order, even after one fails — at-least-once delivery
    /// to every healthy handler. The first error is recorded and returned
    /// to the caller once every handler has run; later errors are logged
    /// only.
    async fn emit(&self, event: TaskRequestEvent) -> MemoqResult<()> {
        let snapshot = {
            let handlers = self.handlers.read().await;
            handlers.get(&event.task_type).cloned().unwrap_or_default()
        };

        if snapshot.is_empty() {
            tracing::warn!(task_type = %event.task_type, "no handler registered for event type");
            return Ok(());
        }

        let mut first_err = None;
        for handler in snapshot {
            if let Err(err) = handler.handle(event.clone()).await {
                tracing::error!(error = %err, task_type = %event.task_type, "event handler failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
