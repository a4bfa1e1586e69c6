//! # Runtime error types

use memoq_shared::MemoqError;
use thiserror::Error;
use uuid::Uuid;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("task queue is full")]
    QueueFull,

    #[error("task queue is closed")]
    QueueClosed,

    #[error("task store failure: {0}")]
    StoreFailure(String),

    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error(transparent)]
    Shared(#[from] MemoqError),
}

impl From<RuntimeError> for MemoqError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::QueueFull => MemoqError::QueueFull,
            RuntimeError::QueueClosed => MemoqError::QueueClosed,
            RuntimeError::StoreFailure(msg) => MemoqError::StoreFailure(msg),
            RuntimeError::TaskNotFound(id) => MemoqError::NotFound(format!("task {id}")),
            RuntimeError::TaskPanicked(msg) => MemoqError::Internal(format!("panic: {msg}")),
            RuntimeError::Shared(e) => e,
        }
    }
}
