//! # The `Task` trait and its persistent row
//!
//! `Task` is the capability set a background unit of work needs: `id()`,
//! `task_type()` (`type` is a keyword, hence the rename), `payload()`,
//! `status()`, and `execute(ctx)`. Concrete task types (the canonical
//! `MemoGenerationTask` lives in `memoq-worker`) implement this trait and
//! are submitted to the `Runner` as `Box<dyn Task>`.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::RuntimeResult;

/// Status of a task row. Monotone in the success path; a reset from
/// `Processing` back to `Pending` is permitted only by recovery or the
/// stuck-task reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The persistent row backing a task, matching the `tasks` table DDL
/// column for column.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: Uuid,
    pub task_type: String,
    pub payload: Vec<u8>,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub status_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    /// A freshly-constructed row for a task about to be submitted, always
    /// `Pending` (invariant: a task row exists for every task ever
    /// submitted, and submission always starts at `Pending`).
    pub fn new_pending(id: Uuid, task_type: impl Into<String>, payload: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id,
            task_type: task_type.into(),
            payload,
            status: TaskStatus::Pending,
            error_message: None,
            status_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Unit of background work. Implementors must be safe to re-drive: recovery
/// and the stuck-task reaper both re-enqueue in-flight work, so `execute`
/// must tolerate running twice for the same row.
#[async_trait]
pub trait Task: Send + Sync {
    /// Opaque 128-bit identifier, unique per task instance.
    fn id(&self) -> Uuid;

    /// Short opaque string discriminating `execute`'s behavior.
    fn task_type(&self) -> &str;

    /// Opaque, self-describing byte payload. Must round-trip through the
    /// task-type's own (de)serialization.
    fn payload(&self) -> Vec<u8>;

    /// The status the task should be submitted with — always `Pending` for
    /// ordinary submission; recovery and the reaper set `Pending` directly
    /// on the store rather than asking the task.
    fn status(&self) -> TaskStatus {
        TaskStatus::Pending
    }

    /// Run the task's work. Implementations should observe `cancel` and
    /// return promptly when it fires.
    async fn execute(&self, cancel: &CancellationToken) -> RuntimeResult<()>;
}
