//! # Backoff primitives
//!
//! A small, reusable exponential-backoff-with-jitter helper. The LLM retry
//! engine in `memoq-worker` is the only current consumer, but the formula
//! is kept crate-agnostic (no knowledge of LLM error classification) so
//! other retrying collaborators can reuse it independent of any one
//! protected component.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Full-range multiplicative jitter: `base * 2^attempt * U(0.5, 1.0)`.
///
/// `attempt` is the zero-based attempt counter (0 for the delay before the
/// second attempt, 1 before the third, and so on).
pub fn jittered_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = 2f64.powi(attempt as i32);
    let jitter = 0.5 + fastrand::f64() * 0.5;
    base.mul_f64(exponent * jitter)
}

/// Outcome of racing a delay against cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The delay elapsed normally.
    Elapsed,
    /// Cancellation was observed before the delay elapsed.
    Cancelled,
}

/// Sleep for `delay`, returning early if `token` is cancelled first.
pub async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> WaitOutcome {
    tokio::select! {
        () = tokio::time::sleep(delay) => WaitOutcome::Elapsed,
        () = token.cancelled() => WaitOutcome::Cancelled,
    }
}
