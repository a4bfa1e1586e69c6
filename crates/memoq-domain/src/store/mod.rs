//! # Domain store
//!
//! `DomainStore` wraps a `Backend` enum (Postgres pool or in-memory tables)
//! and dispatches to the matching module. Enum dispatch rather than a trait
//! object, mirroring `tasker-shared::messaging::client::MessageClient`'s
//! wrap-an-enum-provider shape: there are exactly two backends and both are
//! known at compile time, so a `dyn Trait` buys nothing.

mod memory;
mod postgres;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::models::{Card, GeneratedCard, Memo, MemoStatus, User, UserCardStats};
use memory::InMemoryStore;

#[derive(Debug)]
enum Backend {
    Postgres(PgPool),
    InMemory(InMemoryStore),
}

/// Storage for `User`, `Memo`, `Card`, and `UserCardStats` rows.
#[derive(Debug)]
pub struct DomainStore {
    backend: Backend,
}

impl DomainStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::InMemory(InMemoryStore::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    pub async fn create_user(&self, email: &str) -> DomainResult<User> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::create_user(pool, email).await,
            Backend::InMemory(store) => store.create_user(email).await,
        }
    }

    pub async fn get_user(&self, id: Uuid) -> DomainResult<User> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::get_user(pool, id).await,
            Backend::InMemory(store) => store.get_user(id).await,
        }
    }

    pub async fn update_email(&self, id: Uuid, new_email: &str) -> DomainResult<User> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::update_email(pool, id, new_email).await,
            Backend::InMemory(store) => store.update_email(id, new_email).await,
        }
    }

    pub async fn create_memo(&self, memo: &Memo) -> DomainResult<()> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::create_memo(pool, memo).await,
            Backend::InMemory(store) => store.create_memo(memo).await,
        }
    }

    pub async fn get_memo(&self, id: Uuid) -> DomainResult<Memo> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::get_memo(pool, id).await,
            Backend::InMemory(store) => store.get_memo(id).await,
        }
    }

    pub async fn update_memo_status(&self, id: Uuid, status: MemoStatus) -> DomainResult<()> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::update_memo_status(pool, id, status).await,
            Backend::InMemory(store) => store.update_memo_status(id, status).await,
        }
    }

    pub async fn get_card(&self, id: Uuid) -> DomainResult<Card> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::get_card(pool, id).await,
            Backend::InMemory(store) => store.get_card(id).await,
        }
    }

    pub async fn create_cards_with_stats(
        &self,
        memo_id: Uuid,
        user_id: Uuid,
        generated: Vec<GeneratedCard>,
    ) -> DomainResult<Vec<Card>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                postgres::create_cards_with_stats(pool, memo_id, user_id, generated).await
            }
            Backend::InMemory(store) => {
                store.create_cards_with_stats(memo_id, user_id, generated).await
            }
        }
    }

    pub async fn get_stats(&self, user_id: Uuid, card_id: Uuid) -> DomainResult<UserCardStats> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::get_stats(pool, user_id, card_id).await,
            Backend::InMemory(store) => store.get_stats(user_id, card_id).await,
        }
    }

    pub async fn postpone_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        days: i64,
    ) -> DomainResult<UserCardStats> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::postpone_card(pool, user_id, card_id, days).await,
            Backend::InMemory(store) => store.postpone_card(user_id, card_id, days).await,
        }
    }
}
