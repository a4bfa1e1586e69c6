//! # Worker error types

use memoq_domain::error::DomainError;
use memoq_runtime::RuntimeError;
use memoq_shared::MemoqError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("task payload is invalid: {0}")]
    InvalidPayload(String),

    /// Network/transport/unclassified LLM error after the retry budget was
    /// exhausted, or cancellation observed during backoff.
    #[error("transient generation failure: {0}")]
    TransientGeneration(String),

    /// Content blocked by a safety filter, or a response that doesn't parse
    /// against the documented schema.
    #[error("permanent generation failure: {0}")]
    PermanentGeneration(String),

    #[error(transparent)]
    Shared(#[from] MemoqError),
}

impl From<WorkerError> for RuntimeError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Runtime(e) => e,
            other => RuntimeError::Shared(other.into()),
        }
    }
}

impl From<WorkerError> for MemoqError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Domain(e) => e.into(),
            WorkerError::Runtime(e) => e.into(),
            WorkerError::InvalidPayload(msg) => MemoqError::ValidationFailure(msg),
            WorkerError::TransientGeneration(msg) => MemoqError::TransientGenerationFailure(msg),
            WorkerError::PermanentGeneration(msg) => MemoqError::PermanentGenerationFailure(msg),
            WorkerError::Shared(e) => e,
        }
    }
}
