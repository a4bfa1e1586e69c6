//! # In-memory domain store
//!
//! An `RwLock`-guarded set of maps; this backend is the one the test suite
//! and any embedding without a Postgres dependency use. Because everything
//! lives behind one lock, the "single transaction" guarantee
//! `create_cards_with_stats` needs is just "acquire the write lock once and
//! do every insert before releasing it" — there is no partial visibility
//! to roll back.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{Card, GeneratedCard, Memo, MemoStatus, User, UserCardStats};

#[derive(Debug, Default)]
pub struct MemoryTables {
    pub users: HashMap<Uuid, User>,
    pub users_by_email: HashMap<String, Uuid>,
    pub memos: HashMap<Uuid, Memo>,
    pub cards: HashMap<Uuid, Card>,
    pub stats: HashMap<(Uuid, Uuid), UserCardStats>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<MemoryTables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, email: &str) -> DomainResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users_by_email.contains_key(email) {
            return Err(DomainError::EmailExists(email.to_string()));
        }
        let user = User {
            id: Uuid::now_v7(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        tables.users_by_email.insert(email.to_string(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> DomainResult<User> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(DomainError::UserNotFound(id))
    }

    pub async fn update_email(&self, id: Uuid, new_email: &str) -> DomainResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.users_by_email.get(new_email) {
            if *existing != id {
                return Err(DomainError::EmailExists(new_email.to_string()));
            }
        }
        let old_email = tables
            .users
            .get(&id)
            .ok_or(DomainError::UserNotFound(id))?
            .email
            .clone();
        tables.users_by_email.remove(&old_email);
        tables.users_by_email.insert(new_email.to_string(), id);
        let user = tables.users.get_mut(&id).ok_or(DomainError::UserNotFound(id))?;
        user.email = new_email.to_string();
        Ok(user.clone())
    }

    pub async fn create_memo(&self, memo: &Memo) -> DomainResult<()> {
        self.tables.write().await.memos.insert(memo.id, memo.clone());
        Ok(())
    }

    pub async fn get_memo(&self, id: Uuid) -> DomainResult<Memo> {
        self.tables
            .read()
            .await
            .memos
            .get(&id)
            .cloned()
            .ok_or(DomainError::MemoNotFound(id))
    }

    pub async fn update_memo_status(&self, id: Uuid, status: MemoStatus) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        let memo = tables.memos.get_mut(&id).ok_or(DomainError::MemoNotFound(id))?;
        if !memo.status.can_transition_to(status) {
            return Err(DomainError::InvalidTransition {
                from: memo.status,
                to: status,
            });
        }
        memo.status = status;
        memo.updated_at = Utc::now();
        Ok(())
    }

    pub async fn get_card(&self, id: Uuid) -> DomainResult<Card> {
        self.tables
            .read()
            .await
            .cards
            .get(&id)
            .cloned()
            .ok_or(DomainError::CardNotFound(id))
    }

    pub async fn create_cards_with_stats(
        &self,
        memo_id: Uuid,
        user_id: Uuid,
        generated: Vec<GeneratedCard>,
    ) -> DomainResult<Vec<Card>> {
        let mut tables = self.tables.write().await;
        let cards: Vec<Card> = generated
            .into_iter()
            .map(|g| g.into_card(user_id, memo_id))
            .collect();
        for card in &cards {
            tables.cards.insert(card.id, card.clone());
            let stats = UserCardStats::new_for(user_id, card.id);
            tables.stats.insert((user_id, card.id), stats);
        }
        Ok(cards)
    }

    pub async fn get_stats(&self, user_id: Uuid, card_id: Uuid) -> DomainResult<UserCardStats> {
        self.tables
            .read()
            .await
            .stats
            .get(&(user_id, card_id))
            .cloned()
            .ok_or(DomainError::StatsNotFound { user_id, card_id })
    }

    pub async fn postpone_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        days: i64,
    ) -> DomainResult<UserCardStats> {
        let mut tables = self.tables.write().await;
        let card = tables
            .cards
            .get(&card_id)
            .cloned()
            .ok_or(DomainError::CardNotFound(card_id))?;
        if card.user_id != user_id {
            return Err(DomainError::OwnershipViolation { user_id, card_id });
        }
        let stats = tables
            .stats
            .get_mut(&(user_id, card_id))
            .ok_or(DomainError::StatsNotFound { user_id, card_id })?;
        stats.postpone(days);
        Ok(stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_fetch_memo_round_trips() {
        let store = InMemoryStore::new();
        let user = store.create_user("a@example.com").await.unwrap();
        let memo = Memo::new(user.id, "remember this");
        store.create_memo(&memo).await.unwrap();

        let fetched = store.get_memo(memo.id).await.unwrap();
        assert_eq!(fetched.text, "remember this");
        assert_eq!(fetched.status, MemoStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = InMemoryStore::new();
        store.create_user("dup@example.com").await.unwrap();
        let err = store.create_user("dup@example.com").await.unwrap_err();
        assert!(matches!(err, DomainError::EmailExists(_)));
    }

    #[tokio::test]
    async fn update_memo_status_rejects_skipping_processing() {
        let store = InMemoryStore::new();
        let user = store.create_user("skip@example.com").await.unwrap();
        let memo = Memo::new(user.id, "text");
        store.create_memo(&memo).await.unwrap();

        let err = store
            .update_memo_status(memo.id, MemoStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let fetched = store.get_memo(memo.id).await.unwrap();
        assert_eq!(fetched.status, MemoStatus::Pending);
    }

    #[tokio::test]
    async fn create_cards_with_stats_creates_one_stats_row_per_card() {
        let store = InMemoryStore::new();
        let user = store.create_user("b@example.com").await.unwrap();
        let memo = Memo::new(user.id, "text");
        store.create_memo(&memo).await.unwrap();

        let generated = vec![
            GeneratedCard {
                front: "Q1".into(),
                back: "A1".into(),
                hint: None,
                tags: vec![],
            },
            GeneratedCard {
                front: "Q2".into(),
                back: "A2".into(),
                hint: None,
                tags: vec![],
            },
        ];
        let cards = store
            .create_cards_with_stats(memo.id, user.id, generated)
            .await
            .unwrap();
        assert_eq!(cards.len(), 2);
        for card in &cards {
            let stats = store.get_stats(user.id, card.id).await.unwrap();
            assert_eq!(stats.review_count, 0);
        }
    }

    #[tokio::test]
    async fn postpone_card_rejects_non_owner() {
        let store = InMemoryStore::new();
        let owner = store.create_user("owner@example.com").await.unwrap();
        let intruder = store.create_user("intruder@example.com").await.unwrap();
        let memo = Memo::new(owner.id, "text");
        store.create_memo(&memo).await.unwrap();
        let cards = store
            .create_cards_with_stats(
                memo.id,
                owner.id,
                vec![GeneratedCard {
                    front: "Q".into(),
                    back: "A".into(),
                    hint: None,
                    tags: vec![],
                }],
            )
            .await
            .unwrap();
        let card = &cards[0];

        let before = store.get_stats(owner.id, card.id).await.unwrap();
        let err = store.postpone_card(intruder.id, card.id, 7).await.unwrap_err();
        assert!(matches!(err, DomainError::OwnershipViolation { .. }));

        let after = store.get_stats(owner.id, card.id).await.unwrap();
        assert_eq!(before.next_review_at, after.next_review_at);
    }

    #[tokio::test]
    async fn postpone_card_by_owner_shifts_next_review() {
        let store = InMemoryStore::new();
        let owner = store.create_user("owner2@example.com").await.unwrap();
        let memo = Memo::new(owner.id, "text");
        store.create_memo(&memo).await.unwrap();
        let cards = store
            .create_cards_with_stats(
                memo.id,
                owner.id,
                vec![GeneratedCard {
                    front: "Q".into(),
                    back: "A".into(),
                    hint: None,
                    tags: vec![],
                }],
            )
            .await
            .unwrap();
        let card = &cards[0];
        let before = store.get_stats(owner.id, card.id).await.unwrap();
        let after = store.postpone_card(owner.id, card.id, 7).await.unwrap();
        assert_eq!(after.next_review_at, before.next_review_at + chrono::Duration::days(7));
    }
}
