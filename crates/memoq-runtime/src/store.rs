//! # Task store
//!
//! Durable persistence of task rows. Two implementations: an
//! `InMemoryTaskStore` (the default in tests, and a legitimate production
//! backend in its own right), and a `PostgresTaskStore` matching the
//! `tasks` table DDL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use memoq_shared::txn::SharedTx;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::task::{TaskRow, TaskStatus};

/// Persistent interface over the task table.
#[async_trait]
pub trait TaskStore: Send + Sync + std::fmt::Debug {
    /// Insert a row. Idempotent on primary key.
    async fn save(&self, row: TaskRow) -> RuntimeResult<()>;

    /// Update status, bump `status_at`/`updated_at`, set `error_message`.
    /// Fails silently (returns `Ok(())`) if `id` is unknown — recovery is
    /// allowed to see drift, not crash.
    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error_message: Option<String>,
    ) -> RuntimeResult<()>;

    /// All tasks currently `Pending`. Unordered.
    async fn get_pending(&self) -> RuntimeResult<Vec<TaskRow>>;

    /// All tasks `Processing` whose `status_at` is older than
    /// `older_than`. `older_than == Duration::ZERO` returns every
    /// `Processing` task (used by recovery).
    async fn get_processing(&self, older_than: Duration) -> RuntimeResult<Vec<TaskRow>>;

    /// Save a row as part of an externally-managed transaction, so a
    /// service method's multi-statement write can include the task row
    /// atomically with other store writes.
    async fn save_in_transaction(&self, tx: &mut SharedTx, row: TaskRow) -> RuntimeResult<()>;
}

// ---------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    rows: RwLock<HashMap<Uuid, TaskRow>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, row: TaskRow) -> RuntimeResult<()> {
        self.rows.write().await.insert(row.id, row);
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error_message: Option<String>,
    ) -> RuntimeResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&id) {
            let now = Utc::now();
            row.status = status;
            row.error_message = error_message;
            row.status_at = now;
            row.updated_at = now;
        } else {
            tracing::debug!(task_id = %id, "update_status for unknown task, ignoring");
        }
        Ok(())
    }

    async fn get_pending(&self) -> RuntimeResult<Vec<TaskRow>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.status == TaskStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get_processing(&self, older_than: Duration) -> RuntimeResult<Vec<TaskRow>> {
        let now = Utc::now();
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|r| {
                r.status == TaskStatus::Processing
                    && (older_than.is_zero()
                        || (now - r.status_at)
                            .to_std()
                            .map(|age| age >= older_than)
                            .unwrap_or(false))
            })
            .cloned()
            .collect())
    }

    async fn save_in_transaction(&self, _tx: &mut SharedTx, row: TaskRow) -> RuntimeResult<()> {
        // There is no real transaction boundary over a HashMap: the write
        // below either fully happens or doesn't, which already satisfies
        // "no partial write" for a single insert.
        self.save(row).await
    }
}

// ---------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct PostgresTaskStore {
    pool: PgPool,
}

impl PostgresTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn save(&self, row: TaskRow) -> RuntimeResult<()> {
        sqlx::query(
            "INSERT INTO tasks (id, type, payload, status, error_message, status_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(row.id)
        .bind(&row.task_type)
        .bind(&row.payload)
        .bind(row.status)
        .bind(&row.error_message)
        .bind(row.status_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RuntimeError::StoreFailure(e.to_string()))?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error_message: Option<String>,
    ) -> RuntimeResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE tasks SET status = $1, error_message = $2, status_at = $3, updated_at = $4
             WHERE id = $5",
        )
        .bind(status)
        .bind(&error_message)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RuntimeError::StoreFailure(e.to_string()))?;

        if result.rows_affected() == 0 {
            tracing::debug!(task_id = %id, "update_status for unknown task, ignoring");
        }
        Ok(())
    }

    async fn get_pending(&self) -> RuntimeResult<Vec<TaskRow>> {
        sqlx::query_as::<_, TaskRow>(
            "SELECT id, type AS task_type, payload, status, error_message, status_at, created_at, updated_at
             FROM tasks WHERE status = 'pending'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RuntimeError::StoreFailure(e.to_string()))
    }

    async fn get_processing(&self, older_than: Duration) -> RuntimeResult<Vec<TaskRow>> {
        if older_than.is_zero() {
            sqlx::query_as::<_, TaskRow>(
                "SELECT id, type AS task_type, payload, status, error_message, status_at, created_at, updated_at
                 FROM tasks WHERE status = 'processing'",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RuntimeError::StoreFailure(e.to_string()))
        } else {
            let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
            sqlx::query_as::<_, TaskRow>(
                "SELECT id, type AS task_type, payload, status, error_message, status_at, created_at, updated_at
                 FROM tasks WHERE status = 'processing' AND status_at < $1",
            )
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RuntimeError::StoreFailure(e.to_string()))
        }
    }

    async fn save_in_transaction(&self, tx: &mut SharedTx, row: TaskRow) -> RuntimeResult<()> {
        sqlx::query(
            "INSERT INTO tasks (id, type, payload, status, error_message, status_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(row.id)
        .bind(&row.task_type)
        .bind(&row.payload)
        .bind(row.status)
        .bind(&row.error_message)
        .bind(row.status_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(tx.conn())
        .await
        .map_err(|e| RuntimeError::StoreFailure(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: TaskStatus) -> TaskRow {
        let mut r = TaskRow::new_pending(Uuid::now_v7(), "memo_generation", b"{}".to_vec());
        r.status = status;
        r
    }

    #[tokio::test]
    async fn save_then_get_pending_returns_row() {
        let store = InMemoryTaskStore::new();
        let r = row(TaskStatus::Pending);
        let id = r.id;
        store.save(r).await.unwrap();
        let pending = store.get_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
    }

    #[tokio::test]
    async fn update_status_unknown_id_is_silent() {
        let store = InMemoryTaskStore::new();
        let result = store
            .update_status(Uuid::now_v7(), TaskStatus::Completed, None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn update_status_moves_task_out_of_pending() {
        let store = InMemoryTaskStore::new();
        let r = row(TaskStatus::Pending);
        let id = r.id;
        store.save(r).await.unwrap();
        store
            .update_status(id, TaskStatus::Processing, None)
            .await
            .unwrap();
        assert!(store.get_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_processing_zero_duration_returns_all_processing() {
        let store = InMemoryTaskStore::new();
        store.save(row(TaskStatus::Processing)).await.unwrap();
        store.save(row(TaskStatus::Processing)).await.unwrap();
        store.save(row(TaskStatus::Pending)).await.unwrap();
        let processing = store.get_processing(Duration::ZERO).await.unwrap();
        assert_eq!(processing.len(), 2);
    }

    #[tokio::test]
    async fn get_processing_respects_age_threshold() {
        let store = InMemoryTaskStore::new();
        let mut fresh = row(TaskStatus::Processing);
        fresh.status_at = Utc::now();
        store.save(fresh).await.unwrap();

        let mut stale = row(TaskStatus::Processing);
        stale.status_at = Utc::now() - chrono::Duration::hours(1);
        store.save(stale.clone()).await.unwrap();

        let processing = store
            .get_processing(Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, stale.id);
    }
}
