//! # Card service
//!
//! `create_cards` persists a generated batch and its matching stats rows in
//! one transaction, rejecting the whole batch if any card fails validation
//! before a single row is written. `postpone_card` is the ownership-checked
//! mutation used by the review-postponement flow.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{Card, GeneratedCard, UserCardStats};
use crate::store::DomainStore;

#[derive(Debug)]
pub struct CardService {
    store: Arc<DomainStore>,
}

impl CardService {
    pub fn new(store: Arc<DomainStore>) -> Self {
        Self { store }
    }

    /// Persist `generated` as cards (plus one stats row per card) for
    /// `memo_id`/`user_id`. Rejects the entire batch — no cards persisted —
    /// if any card has an empty front or back.
    #[instrument(skip(self, generated))]
    pub async fn create_cards(
        &self,
        memo_id: Uuid,
        user_id: Uuid,
        generated: Vec<GeneratedCard>,
    ) -> DomainResult<Vec<Card>> {
        for card in &generated {
            if !card.is_valid() {
                return Err(DomainError::Shared(memoq_shared::MemoqError::ValidationFailure(
                    "generated card must have a non-empty front and back".to_string(),
                )));
            }
        }
        self.store
            .create_cards_with_stats(memo_id, user_id, generated)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_card(&self, card_id: Uuid) -> DomainResult<Card> {
        self.store.get_card(card_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self, user_id: Uuid, card_id: Uuid) -> DomainResult<UserCardStats> {
        self.store.get_stats(user_id, card_id).await
    }

    /// Postpone a card's next review by `days`. Fails with
    /// `OwnershipViolation` if `user_id` does not own `card_id`; the stats
    /// row is left untouched and no transaction is committed.
    #[instrument(skip(self))]
    pub async fn postpone_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        days: i64,
    ) -> DomainResult<UserCardStats> {
        self.store.postpone_card(user_id, card_id, days).await
    }
}
