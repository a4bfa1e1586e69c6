//! # LLM retry engine
//!
//! A classification-driven backoff loop: transient failures retry with
//! exponential-backoff-plus-jitter up to `max_retries` additional attempts;
//! permanent failures (content blocked, unparseable/empty response) return
//! immediately on the first attempt. Backoff waits race the caller's
//! cancellation token so `stop()` unwinds an in-flight generation promptly.

use std::future::Future;
use std::time::Duration;

use memoq_shared::resilience::{jittered_delay, sleep_or_cancel, WaitOutcome};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Tunables for a single retry run, already clamped (negative
/// `max_retries` -> 3, `base_delay < 1s` -> 2s) by whoever builds this
/// from `LlmConfig`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// The outcome an attempt classifies itself into, independent of what kind
/// of call produced it — deliberately generic so the retry loop has no
/// knowledge of LLM response shapes.
#[derive(Debug)]
pub enum GenerationError {
    /// Network/transport/unknown error, or an unparseable-but-retriable
    /// condition. Worth retrying.
    Transient(String),
    /// Content blocked by a safety filter, or an empty/unparseable response
    /// that retrying would not fix.
    Permanent(String),
}

/// Run `attempt` up to `cfg.max_retries + 1` times total, sleeping with
/// full-range multiplicative jitter between transient failures. `attempt`
/// receives the zero-based attempt counter so callers can log it.
pub async fn call_with_retry<T, F, Fut>(
    cfg: &RetryConfig,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, WorkerError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt_count = 0u32;
    loop {
        match attempt(attempt_count).await {
            Ok(value) => return Ok(value),
            Err(GenerationError::Permanent(msg)) => {
                tracing::warn!(attempt = attempt_count, reason = %msg, "llm generation failed permanently");
                return Err(WorkerError::PermanentGeneration(msg));
            }
            Err(GenerationError::Transient(msg)) => {
                if attempt_count >= cfg.max_retries {
                    tracing::warn!(
                        attempt = attempt_count,
                        max_retries = cfg.max_retries,
                        reason = %msg,
                        "llm generation exhausted retry budget"
                    );
                    return Err(WorkerError::TransientGeneration(format!(
                        "exhausted {} retries: {msg}",
                        cfg.max_retries
                    )));
                }

                let delay = jittered_delay(cfg.base_delay, attempt_count);
                tracing::debug!(attempt = attempt_count, delay_ms = delay.as_millis() as u64, "retrying llm call after transient failure");
                if sleep_or_cancel(delay, cancel).await == WaitOutcome::Cancelled {
                    return Err(WorkerError::TransientGeneration(format!(
                        "cancelled during backoff: {msg}"
                    )));
                }
                attempt_count += 1;
            }
        }
    }
}
