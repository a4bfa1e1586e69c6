//! # Postgres-backed domain store
//!
//! Runtime-checked `sqlx` queries (no `query!`/`query_as!` macros, which
//! would require a live database at build time) against the schema in
//! `migrations/0001_init.sql`.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{Card, GeneratedCard, Memo, MemoStatus, User, UserCardStats};

pub async fn create_user(pool: &PgPool, email: &str) -> DomainResult<User> {
    let user = User {
        id: Uuid::now_v7(),
        email: email.to_string(),
        created_at: Utc::now(),
    };
    let result = sqlx::query("INSERT INTO users (id, email, created_at) VALUES ($1, $2, $3)")
        .bind(user.id)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(pool)
        .await;

    match result {
        Ok(_) => Ok(user),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(DomainError::EmailExists(email.to_string()))
        }
        Err(e) => Err(DomainError::Database(e)),
    }
}

pub async fn get_user(pool: &PgPool, id: Uuid) -> DomainResult<User> {
    sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DomainError::Database)?
        .ok_or(DomainError::UserNotFound(id))
}

pub async fn update_email(pool: &PgPool, id: Uuid, new_email: &str) -> DomainResult<User> {
    let result = sqlx::query_as::<_, User>(
        "UPDATE users SET email = $1 WHERE id = $2 RETURNING id, email, created_at",
    )
    .bind(new_email)
    .bind(id)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(DomainError::UserNotFound(id)),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(DomainError::EmailExists(new_email.to_string()))
        }
        Err(e) => Err(DomainError::Database(e)),
    }
}

pub async fn create_memo(pool: &PgPool, memo: &Memo) -> DomainResult<()> {
    sqlx::query(
        "INSERT INTO memos (id, user_id, text, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(memo.id)
    .bind(memo.user_id)
    .bind(&memo.text)
    .bind(memo.status)
    .bind(memo.created_at)
    .bind(memo.updated_at)
    .execute(pool)
    .await
    .map_err(DomainError::Database)?;
    Ok(())
}

pub async fn get_memo(pool: &PgPool, id: Uuid) -> DomainResult<Memo> {
    sqlx::query_as::<_, Memo>(
        "SELECT id, user_id, text, status, created_at, updated_at FROM memos WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(DomainError::Database)?
    .ok_or(DomainError::MemoNotFound(id))
}

/// Validates the requested transition against the current row inside one
/// transaction so a concurrent status write can't race the check.
pub async fn update_memo_status(pool: &PgPool, id: Uuid, status: MemoStatus) -> DomainResult<()> {
    let mut tx: Transaction<'static, Postgres> = pool.begin().await.map_err(DomainError::Database)?;

    let current: Option<(MemoStatus,)> =
        sqlx::query_as("SELECT status FROM memos WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DomainError::Database)?;
    let (current_status,) = current.ok_or(DomainError::MemoNotFound(id))?;

    if !current_status.can_transition_to(status) {
        tx.rollback().await.map_err(DomainError::Database)?;
        return Err(DomainError::InvalidTransition {
            from: current_status,
            to: status,
        });
    }

    sqlx::query("UPDATE memos SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(DomainError::Database)?;

    tx.commit().await.map_err(DomainError::Database)?;
    Ok(())
}

pub async fn get_card(pool: &PgPool, id: Uuid) -> DomainResult<Card> {
    sqlx::query_as::<_, Card>(
        "SELECT id, user_id, memo_id, front, back, hint, tags, created_at, updated_at
         FROM cards WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(DomainError::Database)?
    .ok_or(DomainError::CardNotFound(id))
}

/// Persist a batch of generated cards and their matching stats rows in a
/// single transaction: partial failure must leave neither cards nor stats
/// behind.
pub async fn create_cards_with_stats(
    pool: &PgPool,
    memo_id: Uuid,
    user_id: Uuid,
    generated: Vec<GeneratedCard>,
) -> DomainResult<Vec<Card>> {
    let mut tx: Transaction<'static, Postgres> = pool.begin().await.map_err(DomainError::Database)?;
    let mut cards = Vec::with_capacity(generated.len());

    for g in generated {
        let card = g.into_card(user_id, memo_id);
        sqlx::query(
            "INSERT INTO cards (id, user_id, memo_id, front, back, hint, tags, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(card.id)
        .bind(card.user_id)
        .bind(card.memo_id)
        .bind(&card.front)
        .bind(&card.back)
        .bind(&card.hint)
        .bind(&card.tags)
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DomainError::Database)?;

        let stats = UserCardStats::new_for(user_id, card.id);
        sqlx::query(
            "INSERT INTO user_card_stats
                (user_id, card_id, interval_days, ease_factor, consecutive_correct, review_count, last_reviewed_at, next_review_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(stats.user_id)
        .bind(stats.card_id)
        .bind(stats.interval_days)
        .bind(stats.ease_factor)
        .bind(stats.consecutive_correct)
        .bind(stats.review_count)
        .bind(stats.last_reviewed_at)
        .bind(stats.next_review_at)
        .execute(&mut *tx)
        .await
        .map_err(DomainError::Database)?;

        cards.push(card);
    }

    tx.commit().await.map_err(DomainError::Database)?;
    Ok(cards)
}

pub async fn get_stats(pool: &PgPool, user_id: Uuid, card_id: Uuid) -> DomainResult<UserCardStats> {
    sqlx::query_as::<_, UserCardStats>(
        "SELECT user_id, card_id, interval_days, ease_factor, consecutive_correct,
                review_count, last_reviewed_at, next_review_at
         FROM user_card_stats WHERE user_id = $1 AND card_id = $2",
    )
    .bind(user_id)
    .bind(card_id)
    .fetch_optional(pool)
    .await
    .map_err(DomainError::Database)?
    .ok_or(DomainError::StatsNotFound { user_id, card_id })
}

/// Postpone a card's next review, taking a row-level lock on the stats row
/// (`FOR UPDATE`) for the duration of the ownership check and update.
pub async fn postpone_card(
    pool: &PgPool,
    user_id: Uuid,
    card_id: Uuid,
    days: i64,
) -> DomainResult<UserCardStats> {
    let mut tx: Transaction<'static, Postgres> = pool.begin().await.map_err(DomainError::Database)?;

    let owner: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM cards WHERE id = $1")
        .bind(card_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DomainError::Database)?;
    let (owner_id,) = owner.ok_or(DomainError::CardNotFound(card_id))?;
    if owner_id != user_id {
        tx.rollback().await.map_err(DomainError::Database)?;
        return Err(DomainError::OwnershipViolation { user_id, card_id });
    }

    let existing = sqlx::query_as::<_, UserCardStats>(
        "SELECT user_id, card_id, interval_days, ease_factor, consecutive_correct,
                review_count, last_reviewed_at, next_review_at
         FROM user_card_stats WHERE user_id = $1 AND card_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(card_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(DomainError::Database)?
    .ok_or(DomainError::StatsNotFound { user_id, card_id })?;

    let next_review_at = existing.next_review_at + chrono::Duration::days(days);
    let updated = sqlx::query_as::<_, UserCardStats>(
        "UPDATE user_card_stats SET next_review_at = $1
         WHERE user_id = $2 AND card_id = $3
         RETURNING user_id, card_id, interval_days, ease_factor, consecutive_correct,
                   review_count, last_reviewed_at, next_review_at",
    )
    .bind(next_review_at)
    .bind(user_id)
    .bind(card_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(DomainError::Database)?;

    tx.commit().await.map_err(DomainError::Database)?;
    Ok(updated)
}
