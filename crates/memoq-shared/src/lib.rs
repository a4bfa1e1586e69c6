//! # memoq-shared
//!
//! Cross-cutting primitives shared by every other crate in the workspace:
//! error kinds, configuration loading, tracing initialization, and the
//! generic exponential-backoff helper the LLM retry engine builds on.

pub mod config;
pub mod error;
pub mod events;
pub mod resilience;
pub mod telemetry;
pub mod txn;

pub use error::{MemoqError, MemoqResult};
pub use events::{EventPublisher, NullPublisher, TaskRequestEvent};
