//! # User service
//!
//! Minimal surface: creation, lookup, and email change. Exists so the
//! `OwnershipViolation`/`EmailExists` error variants have a concrete home,
//! and so an owner/intruder pair can be constructed end-to-end for the
//! card-ownership checks.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::models::User;
use crate::store::DomainStore;

#[derive(Debug)]
pub struct UserService {
    store: Arc<DomainStore>,
}

impl UserService {
    pub fn new(store: Arc<DomainStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self, email: &str) -> DomainResult<User> {
        self.store.create_user(email).await
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> DomainResult<User> {
        self.store.get_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_email(&self, user_id: Uuid, new_email: &str) -> DomainResult<User> {
        self.store.update_email(user_id, new_email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;

    fn service() -> UserService {
        UserService::new(Arc::new(DomainStore::in_memory()))
    }

    #[tokio::test]
    async fn create_user_then_fetch() {
        let svc = service();
        let user = svc.create_user("a@example.com").await.unwrap();
        let fetched = svc.get_user(user.id).await.unwrap();
        assert_eq!(fetched.email, "a@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let svc = service();
        svc.create_user("dup@example.com").await.unwrap();
        let err = svc.create_user("dup@example.com").await.unwrap_err();
        assert!(matches!(err, DomainError::EmailExists(_)));
    }

    #[tokio::test]
    async fn update_email_changes_lookup() {
        let svc = service();
        let user = svc.create_user("old@example.com").await.unwrap();
        svc.update_email(user.id, "new@example.com").await.unwrap();
        let fetched = svc.get_user(user.id).await.unwrap();
        assert_eq!(fetched.email, "new@example.com");
    }
}
