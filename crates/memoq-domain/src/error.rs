//! # Domain error types

use memoq_shared::MemoqError;
use thiserror::Error;
use uuid::Uuid;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("memo not found: {0}")]
    MemoNotFound(Uuid),

    #[error("card not found: {0}")]
    CardNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("stats not found for user {user_id} card {card_id}")]
    StatsNotFound { user_id: Uuid, card_id: Uuid },

    #[error("email already exists: {0}")]
    EmailExists(String),

    #[error("user {user_id} does not own card {card_id}")]
    OwnershipViolation { user_id: Uuid, card_id: Uuid },

    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::models::MemoStatus,
        to: crate::models::MemoStatus,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Shared(#[from] MemoqError),
}

impl From<DomainError> for MemoqError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MemoNotFound(id) => MemoqError::NotFound(format!("memo {id}")),
            DomainError::CardNotFound(id) => MemoqError::NotFound(format!("card {id}")),
            DomainError::UserNotFound(id) => MemoqError::NotFound(format!("user {id}")),
            DomainError::StatsNotFound { user_id, card_id } => {
                MemoqError::NotFound(format!("stats for user {user_id} card {card_id}"))
            }
            DomainError::EmailExists(email) => {
                MemoqError::ValidationFailure(format!("email exists: {email}"))
            }
            DomainError::OwnershipViolation { user_id, card_id } => MemoqError::OwnershipViolation(
                format!("user {user_id} does not own card {card_id}"),
            ),
            DomainError::InvalidTransition { from, to } => {
                MemoqError::ValidationFailure(format!("invalid transition {from:?} -> {to:?}"))
            }
            DomainError::Database(e) => MemoqError::StoreFailure(e.to_string()),
            DomainError::Shared(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_violation_maps_to_shared_ownership_violation() {
        let err = DomainError::OwnershipViolation {
            user_id: Uuid::nil(),
            card_id: Uuid::nil(),
        };
        let shared: MemoqError = err.into();
        assert!(matches!(shared, MemoqError::OwnershipViolation(_)));
    }

    #[test]
    fn not_found_variants_map_to_shared_not_found() {
        let err = DomainError::MemoNotFound(Uuid::nil());
        let shared: MemoqError = err.into();
        assert!(matches!(shared, MemoqError::NotFound(_)));
    }
}
