//! # Shared transaction handle
//!
//! `SharedTx` is the common currency a service method and the task store use
//! to participate in one Postgres transaction: a multi-statement flow
//! (e.g. persisting a card batch and a task's status write together) opens
//! one transaction and hands `&mut SharedTx` to every collaborator that
//! needs to write inside it.

use sqlx::{PgConnection, Postgres, Transaction};

/// An open Postgres transaction, shared across crate boundaries so neither
/// the domain layer nor the task-runtime layer needs to depend on the
/// other's concrete transaction type.
pub struct SharedTx(pub Transaction<'static, Postgres>);

impl SharedTx {
    pub fn begin(tx: Transaction<'static, Postgres>) -> Self {
        Self(tx)
    }

    /// Borrow the underlying connection for a query executed against this
    /// transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.0
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.0.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.0.rollback().await
    }
}
