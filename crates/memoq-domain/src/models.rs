//! # Domain entities
//!
//! `Memo`, `Card`, `UserCardStats`, and `User`, with `sqlx::FromRow` for
//! repository reads and `serde` for event/API (de)serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a memo as it moves through generation.
///
/// Transitions permitted: `Pending -> Processing -> {Completed, Failed}`,
/// plus `Processing -> Pending` on recovery of interrupted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MemoStatus {
    /// Whether `self -> next` is a permitted transition for a memo.
    pub fn can_transition_to(self, next: MemoStatus) -> bool {
        matches!(
            (self, next),
            (MemoStatus::Pending, MemoStatus::Processing)
                | (MemoStatus::Processing, MemoStatus::Completed)
                | (MemoStatus::Processing, MemoStatus::Failed)
                | (MemoStatus::Processing, MemoStatus::Pending)
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Memo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub status: MemoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memo {
    pub fn new(user_id: Uuid, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            text: text.into(),
            status: MemoStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub memo_id: Uuid,
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single generated card, prior to persistence — the shape the LLM
/// generator hands back to the memo-generation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GeneratedCard {
    /// Every generated card must have a non-empty front and back.
    pub fn is_valid(&self) -> bool {
        !self.front.trim().is_empty() && !self.back.trim().is_empty()
    }

    pub fn into_card(self, user_id: Uuid, memo_id: Uuid) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::now_v7(),
            user_id,
            memo_id,
            front: self.front,
            back: self.back,
            hint: self.hint,
            tags: self.tags,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserCardStats {
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub interval_days: i32,
    pub ease_factor: f64,
    pub consecutive_correct: i32,
    pub review_count: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: DateTime<Utc>,
}

impl UserCardStats {
    /// Fresh stats row created alongside a new card.
    pub fn new_for(user_id: Uuid, card_id: Uuid) -> Self {
        Self {
            user_id,
            card_id,
            interval_days: 0,
            ease_factor: 2.5,
            consecutive_correct: 0,
            review_count: 0,
            last_reviewed_at: None,
            next_review_at: Utc::now(),
        }
    }

    /// Push the next review out by `days`, as `postpone_card` does.
    pub fn postpone(&mut self, days: i64) {
        self.next_review_at += chrono::Duration::days(days);
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_status_transitions_allowed() {
        assert!(MemoStatus::Pending.can_transition_to(MemoStatus::Processing));
        assert!(MemoStatus::Processing.can_transition_to(MemoStatus::Completed));
        assert!(MemoStatus::Processing.can_transition_to(MemoStatus::Failed));
        assert!(MemoStatus::Processing.can_transition_to(MemoStatus::Pending));
    }

    #[test]
    fn memo_status_transitions_disallowed() {
        assert!(!MemoStatus::Pending.can_transition_to(MemoStatus::Completed));
        assert!(!MemoStatus::Completed.can_transition_to(MemoStatus::Processing));
        assert!(!MemoStatus::Failed.can_transition_to(MemoStatus::Pending));
    }

    #[test]
    fn generated_card_validity() {
        let valid = GeneratedCard {
            front: "Q".to_string(),
            back: "A".to_string(),
            hint: None,
            tags: vec![],
        };
        assert!(valid.is_valid());

        let empty_back = GeneratedCard {
            front: "Q".to_string(),
            back: "   ".to_string(),
            hint: None,
            tags: vec![],
        };
        assert!(!empty_back.is_valid());
    }

    #[test]
    fn stats_postpone_shifts_next_review() {
        let mut stats = UserCardStats::new_for(Uuid::now_v7(), Uuid::now_v7());
        let before = stats.next_review_at;
        stats.postpone(7);
        assert_eq!(stats.next_review_at, before + chrono::Duration::days(7));
    }
}
