//! # Memo service
//!
//! The sole writer of memo status: task code never mutates a memo
//! directly, only through `update_memo_status`. `create_memo` is also
//! where the circular producer/consumer dependency breaks: the service
//! persists the memo, then emits a `TaskRequestEvent` without knowing (or
//! caring) what, if anything, is listening.

use std::sync::Arc;

use memoq_shared::events::{EventPublisher, TaskRequestEvent};
use tracing::instrument;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::models::{Memo, MemoStatus};
use crate::store::DomainStore;

#[derive(Debug)]
pub struct MemoService {
    store: Arc<DomainStore>,
    events: Arc<dyn EventPublisher>,
}

impl MemoService {
    pub fn new(store: Arc<DomainStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    /// Create a memo and emit a `memo_generation` task request event.
    ///
    /// The service's call returns only after every registered event handler
    /// has run (synchronous fan-out) — the caller observes submission
    /// errors, if any, here rather than learning of them later.
    #[instrument(skip(self, text))]
    pub async fn create_memo(&self, user_id: Uuid, text: impl Into<String>) -> DomainResult<Memo> {
        let memo = Memo::new(user_id, text);
        self.store.create_memo(&memo).await?;

        let event = TaskRequestEvent::new(
            "memo_generation",
            serde_json::json!({ "memo_id": memo.id }),
        );
        if let Err(err) = self.events.emit(event).await {
            tracing::warn!(memo_id = %memo.id, error = %err, "task request event emission failed");
        }

        Ok(memo)
    }

    #[instrument(skip(self))]
    pub async fn get_memo(&self, memo_id: Uuid) -> DomainResult<Memo> {
        self.store.get_memo(memo_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_memo_status(&self, memo_id: Uuid, status: MemoStatus) -> DomainResult<()> {
        self.store.update_memo_status(memo_id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoq_shared::events::NullPublisher;

    fn service() -> MemoService {
        MemoService::new(Arc::new(DomainStore::in_memory()), Arc::new(NullPublisher))
    }

    #[tokio::test]
    async fn create_memo_starts_pending() {
        let svc = service();
        let memo = svc.create_memo(Uuid::now_v7(), "hello").await.unwrap();
        assert_eq!(memo.status, MemoStatus::Pending);
    }

    #[tokio::test]
    async fn update_memo_status_persists() {
        let svc = service();
        let memo = svc.create_memo(Uuid::now_v7(), "hello").await.unwrap();
        svc.update_memo_status(memo.id, MemoStatus::Processing)
            .await
            .unwrap();
        let fetched = svc.get_memo(memo.id).await.unwrap();
        assert_eq!(fetched.status, MemoStatus::Processing);
    }

    #[tokio::test]
    async fn get_memo_missing_is_not_found() {
        let svc = service();
        let err = svc.get_memo(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, crate::error::DomainError::MemoNotFound(_)));
    }
}
