//! # The memo-generation task
//!
//! The one concrete `Task` this workspace ships: read a memo, call the
//! generator under retry, persist the resulting cards transactionally, and
//! advance the memo's status. Mixed ownership of that status is resolved
//! by routing every transition through `MemoService` — this task never
//! writes a memo row directly.

use std::sync::Arc;

use async_trait::async_trait;
use memoq_domain::models::MemoStatus;
use memoq_domain::{CardService, MemoService};
use memoq_runtime::{RuntimeError, RuntimeResult, Task, TaskStatus};
use memoq_shared::MemoqError;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::WorkerError;
use crate::generator::Generator;

pub const MEMO_GENERATION_TASK_TYPE: &str = "memo_generation";

/// The task payload, JSON-encoded: `{"memo_id": "<uuid>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoGenerationPayload {
    pub memo_id: Uuid,
}

pub struct MemoGenerationTask {
    id: Uuid,
    memo_id: Uuid,
    memo_service: Arc<MemoService>,
    card_service: Arc<CardService>,
    generator: Arc<dyn Generator>,
}

impl MemoGenerationTask {
    pub fn new(
        memo_id: Uuid,
        memo_service: Arc<MemoService>,
        card_service: Arc<CardService>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            memo_id,
            memo_service,
            card_service,
            generator,
        }
    }

    /// Rebuild from a persisted row's `id`/payload, used by recovery and
    /// the stuck-task reaper to resubmit the *same* task identity rather
    /// than minting a new one.
    pub fn from_row(
        id: Uuid,
        memo_id: Uuid,
        memo_service: Arc<MemoService>,
        card_service: Arc<CardService>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            id,
            memo_id,
            memo_service,
            card_service,
            generator,
        }
    }
}

#[async_trait]
impl Task for MemoGenerationTask {
    fn id(&self) -> Uuid {
        self.id
    }

    fn task_type(&self) -> &str {
        MEMO_GENERATION_TASK_TYPE
    }

    fn payload(&self) -> Vec<u8> {
        serde_json::to_vec(&MemoGenerationPayload {
            memo_id: self.memo_id,
        })
        .expect("MemoGenerationPayload always serializes")
    }

    fn status(&self) -> TaskStatus {
        TaskStatus::Pending
    }

    async fn execute(&self, cancel: &CancellationToken) -> RuntimeResult<()> {
        // A context already cancelled before we start is a failure, not a
        // no-op.
        if cancel.is_cancelled() {
            return Err(worker_err(WorkerError::Shared(MemoqError::Cancelled)));
        }

        // Step 2.
        let memo = self
            .memo_service
            .get_memo(self.memo_id)
            .await
            .map_err(|e| worker_err(WorkerError::from(e)))?;

        // Step 3.
        self.memo_service
            .update_memo_status(self.memo_id, MemoStatus::Processing)
            .await
            .map_err(|e| worker_err(WorkerError::from(e)))?;

        // Step 4.
        let cards = match self
            .generator
            .generate_cards(cancel, &memo.text, memo.user_id)
            .await
        {
            Ok(cards) => cards,
            Err(err) => {
                self.best_effort_fail_memo().await;
                return Err(worker_err(err));
            }
        };

        // Zero cards with no error is not a failure — only a non-empty
        // batch needs persisting.
        if cards.is_empty() {
            tracing::warn!(memo_id = %self.memo_id, "generator returned zero cards for memo");
        } else if let Err(err) = self
            .card_service
            .create_cards(self.memo_id, memo.user_id, cards)
            .await
        {
            self.best_effort_fail_memo().await;
            return Err(worker_err(WorkerError::from(err)));
        }

        // Step 6: errors here are logged, not propagated — the real work
        // (cards + stats) is already durable.
        if let Err(err) = self
            .memo_service
            .update_memo_status(self.memo_id, MemoStatus::Completed)
            .await
        {
            tracing::warn!(memo_id = %self.memo_id, error = %err, "failed to mark memo completed after successful generation");
        }

        Ok(())
    }
}

impl MemoGenerationTask {
    async fn best_effort_fail_memo(&self) {
        if let Err(err) = self
            .memo_service
            .update_memo_status(self.memo_id, MemoStatus::Failed)
            .await
        {
            tracing::warn!(memo_id = %self.memo_id, error = %err, "failed to mark memo failed after generation error");
        }
    }
}

fn worker_err(err: WorkerError) -> RuntimeError {
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memoq_domain::DomainStore;
    use memoq_shared::events::NullPublisher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGenerator {
        cards: Vec<memoq_domain::models::GeneratedCard>,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate_cards(
            &self,
            _cancel: &CancellationToken,
            _text: &str,
            _user_id: Uuid,
        ) -> crate::error::WorkerResult<Vec<memoq_domain::models::GeneratedCard>> {
            Ok(self.cards.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate_cards(
            &self,
            _cancel: &CancellationToken,
            _text: &str,
            _user_id: Uuid,
        ) -> crate::error::WorkerResult<Vec<memoq_domain::models::GeneratedCard>> {
            Err(WorkerError::PermanentGeneration("safety block".to_string()))
        }
    }

    async fn setup() -> (Arc<MemoService>, Arc<CardService>, Uuid) {
        let store = Arc::new(DomainStore::in_memory());
        let memo_service = Arc::new(MemoService::new(Arc::clone(&store), Arc::new(NullPublisher)));
        let card_service = Arc::new(CardService::new(Arc::clone(&store)));
        let memo = memo_service.create_memo(Uuid::now_v7(), "some memo text").await.unwrap();
        (memo_service, card_service, memo.id)
    }

    #[tokio::test]
    async fn happy_path_completes_memo_and_persists_cards() {
        let (memo_service, card_service, memo_id) = setup().await;
        let generator = Arc::new(FixedGenerator {
            cards: vec![
                memoq_domain::models::GeneratedCard {
                    front: "Q1".into(),
                    back: "A1".into(),
                    hint: None,
                    tags: vec![],
                },
                memoq_domain::models::GeneratedCard {
                    front: "Q2".into(),
                    back: "A2".into(),
                    hint: None,
                    tags: vec![],
                },
            ],
        });
        let task = MemoGenerationTask::new(
            memo_id,
            Arc::clone(&memo_service),
            Arc::clone(&card_service),
            generator,
        );

        let cancel = CancellationToken::new();
        task.execute(&cancel).await.unwrap();

        let memo = memo_service.get_memo(memo_id).await.unwrap();
        assert_eq!(memo.status, MemoStatus::Completed);
    }

    #[tokio::test]
    async fn zero_cards_still_completes_memo() {
        let (memo_service, card_service, memo_id) = setup().await;
        let generator = Arc::new(FixedGenerator { cards: vec![] });
        let task = MemoGenerationTask::new(memo_id, Arc::clone(&memo_service), card_service, generator);

        let cancel = CancellationToken::new();
        task.execute(&cancel).await.unwrap();

        let memo = memo_service.get_memo(memo_id).await.unwrap();
        assert_eq!(memo.status, MemoStatus::Completed);
    }

    #[tokio::test]
    async fn generation_failure_fails_memo_and_task() {
        let (memo_service, card_service, memo_id) = setup().await;
        let task = MemoGenerationTask::new(
            memo_id,
            Arc::clone(&memo_service),
            card_service,
            Arc::new(FailingGenerator),
        );

        let cancel = CancellationToken::new();
        let err = task.execute(&cancel).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Shared(MemoqError::PermanentGenerationFailure(_))));

        let memo = memo_service.get_memo(memo_id).await.unwrap();
        assert_eq!(memo.status, MemoStatus::Failed);
    }

    #[tokio::test]
    async fn already_cancelled_context_fails_without_calling_generator() {
        let (memo_service, card_service, memo_id) = setup().await;
        let calls = Arc::new(AtomicUsize::new(0));

        struct CountingGenerator(Arc<AtomicUsize>);
        #[async_trait]
        impl Generator for CountingGenerator {
            async fn generate_cards(
                &self,
                _cancel: &CancellationToken,
                _text: &str,
                _user_id: Uuid,
            ) -> crate::error::WorkerResult<Vec<memoq_domain::models::GeneratedCard>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            }
        }

        let task = MemoGenerationTask::new(
            memo_id,
            memo_service,
            card_service,
            Arc::new(CountingGenerator(Arc::clone(&calls))),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = task.execute(&cancel).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Shared(MemoqError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn payload_round_trips() {
        let memo_id = Uuid::now_v7();
        let payload = MemoGenerationPayload { memo_id };
        let bytes = serde_json::to_vec(&payload).unwrap();
        let parsed: MemoGenerationPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.memo_id, memo_id);
    }
}
