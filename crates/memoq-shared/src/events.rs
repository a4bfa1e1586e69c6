//! # Task request events
//!
//! `TaskRequestEvent` and the `EventPublisher` trait live here (rather than
//! in `memoq-runtime`, where the event bus itself is implemented) so that
//! `memoq-domain`'s service layer can emit events when it persists an
//! entity without depending on the runtime crate that consumes them —
//! breaking the circular producer/consumer dependency between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoqResult;

/// A producer-side request to create a task. Constructed, fanned out, and
/// discarded — never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequestEvent {
    pub id: Uuid,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TaskRequestEvent {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_type: task_type.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Anything that can accept a `TaskRequestEvent` for synchronous fan-out.
///
/// Implemented by the event bus in `memoq-runtime`; referenced here so that
/// `memoq-domain`'s service layer can hold `Arc<dyn EventPublisher>` without
/// depending on the runtime crate.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync + std::fmt::Debug {
    async fn emit(&self, event: TaskRequestEvent) -> MemoqResult<()>;
}

/// A publisher that drops every event — the default when no task-producing
/// side effects are wired up (e.g. in isolated domain-layer tests).
#[derive(Debug, Default)]
pub struct NullPublisher;

#[async_trait::async_trait]
impl EventPublisher for NullPublisher {
    async fn emit(&self, _event: TaskRequestEvent) -> MemoqResult<()> {
        Ok(())
    }
}
