//! # Task factory / event handler
//!
//! The single bridge from a `TaskRequestEvent` to a constructed,
//! submitted `Task`. Breaks the circular producer/consumer dependency:
//! `MemoService` only knows how to emit an event; this module is the
//! one place that knows `memo_generation` events become
//! `MemoGenerationTask`s, and holds the collaborators (`MemoService`,
//! `CardService`, `Generator`) those tasks need.
//!
//! The same struct also implements `TaskRehydrator` so recovery and the
//! stuck-task reaper can rebuild the identical task from a persisted row
//! without going through the event bus again.

use std::sync::Arc;

use async_trait::async_trait;
use memoq_domain::{CardService, MemoService};
use memoq_runtime::event_bus::TaskRequestHandler;
use memoq_runtime::runner::{Runner, TaskRehydrator};
use memoq_runtime::task::{Task, TaskRow};
use memoq_shared::{MemoqError, MemoqResult, TaskRequestEvent};
use uuid::Uuid;

use crate::generator::Generator;
use crate::memo_task::{MemoGenerationPayload, MemoGenerationTask, MEMO_GENERATION_TASK_TYPE};

/// Constructs `MemoGenerationTask`s from either a fresh `memo_id` (event
/// path) or a persisted row (recovery/reaper path).
pub struct MemoGenerationTaskFactory {
    memo_service: Arc<MemoService>,
    card_service: Arc<CardService>,
    generator: Arc<dyn Generator>,
}

impl MemoGenerationTaskFactory {
    pub fn new(
        memo_service: Arc<MemoService>,
        card_service: Arc<CardService>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            memo_service,
            card_service,
            generator,
        }
    }

    pub fn build(&self, memo_id: Uuid) -> MemoGenerationTask {
        MemoGenerationTask::new(
            memo_id,
            Arc::clone(&self.memo_service),
            Arc::clone(&self.card_service),
            Arc::clone(&self.generator),
        )
    }
}

impl TaskRehydrator for MemoGenerationTaskFactory {
    fn rehydrate(&self, row: &TaskRow) -> Option<Box<dyn Task>> {
        if row.task_type != MEMO_GENERATION_TASK_TYPE {
            return None;
        }
        let payload: MemoGenerationPayload = match serde_json::from_slice(&row.payload) {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(task_id = %row.id, error = %err, "could not decode memo_generation payload during rehydration");
                return None;
            }
        };
        Some(Box::new(MemoGenerationTask::from_row(
            row.id,
            payload.memo_id,
            Arc::clone(&self.memo_service),
            Arc::clone(&self.card_service),
            Arc::clone(&self.generator),
        )))
    }
}

/// Subscribed on the event bus for the `memo_generation` task type. Ignores
/// mismatched events, parses the payload, builds the task, submits it.
pub struct MemoGenerationEventHandler {
    factory: Arc<MemoGenerationTaskFactory>,
    runner: Arc<Runner>,
}

impl MemoGenerationEventHandler {
    pub fn new(factory: Arc<MemoGenerationTaskFactory>, runner: Arc<Runner>) -> Self {
        Self { factory, runner }
    }
}

#[async_trait]
impl TaskRequestHandler for MemoGenerationEventHandler {
    async fn handle(&self, event: TaskRequestEvent) -> MemoqResult<()> {
        if event.task_type != MEMO_GENERATION_TASK_TYPE {
            return Ok(());
        }

        let payload: MemoGenerationPayload = serde_json::from_value(event.payload.clone())
            .map_err(|err| {
                MemoqError::ValidationFailure(format!("malformed memo_generation event payload: {err}"))
            })?;

        let task = self.factory.build(payload.memo_id);
        self.runner
            .submit(Box::new(task))
            .await
            .map_err(MemoqError::from)
    }
}
