//! # Shared error vocabulary
//!
//! `MemoqError` carries the error kinds common across the whole workspace
//! (configuration, queue, store, generation, validation, ownership,
//! not-found, cancellation) so that every downstream crate can wrap it
//! with `#[from]` instead of re-inventing the same sentinel conditions
//! under different names.

use thiserror::Error;

/// Result alias used throughout the workspace wherever a function can only
/// fail with one of the shared error kinds (no crate-specific detail to add).
pub type MemoqResult<T> = Result<T, MemoqError>;

/// The error kinds shared across the workspace.
#[derive(Debug, Error)]
pub enum MemoqError {
    /// Missing prompt template path, invalid API credentials, negative queue
    /// capacity. Fatal at startup.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Submission-time condition: the bounded queue is at capacity. The
    /// caller may retry, or rely on recovery at the next process start.
    #[error("task queue is full")]
    QueueFull,

    /// Submission after shutdown. Fatal for the caller's operation.
    #[error("task queue is closed")]
    QueueClosed,

    /// Database error persisting or reading rows. Tasks left `processing`
    /// are caught by the reaper.
    #[error("store failure: {0}")]
    StoreFailure(String),

    /// Network/timeout/unclassified LLM error after the retry budget was
    /// exhausted, or cancellation during backoff.
    #[error("transient generation failure: {0}")]
    TransientGenerationFailure(String),

    /// Content blocked by a safety filter, or a response that doesn't
    /// parse against the expected schema.
    #[error("permanent generation failure: {0}")]
    PermanentGenerationFailure(String),

    /// Task payload malformed, memo not found, user not owner, card content
    /// invalid.
    #[error("validation failure: {0}")]
    ValidationFailure(String),

    /// A user attempted to mutate an entity they do not own.
    #[error("ownership violation: {0}")]
    OwnershipViolation(String),

    /// Entity missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The runner or caller cancelled the context.
    #[error("operation cancelled")]
    Cancelled,

    /// Catch-all for I/O/serialization failures in the ambient stack.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoqError {
    /// Whether the condition is worth a caller retrying, matching the
    /// specification's synchronous-submission-error surface
    /// (`queueFull`, `queueClosed`, `storeFailure` only).
    pub fn is_queue_or_store(&self) -> bool {
        matches!(
            self,
            MemoqError::QueueFull | MemoqError::QueueClosed | MemoqError::StoreFailure(_)
        )
    }
}

impl From<std::io::Error> for MemoqError {
    fn from(err: std::io::Error) -> Self {
        MemoqError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for MemoqError {
    fn from(err: serde_json::Error) -> Self {
        MemoqError::ValidationFailure(format!("json: {err}"))
    }
}

impl From<config::ConfigError> for MemoqError {
    fn from(err: config::ConfigError) -> Self {
        MemoqError::ConfigurationInvalid(err.to_string())
    }
}
