//! # memoq-worker
//!
//! The one concrete task type this workspace ships (`MemoGenerationTask`),
//! the LLM retry engine and generator adapter it calls through, and the
//! event-to-task factory that bridges `memoq-domain`'s event emissions to
//! `memoq-runtime`'s `Runner`.

pub mod error;
pub mod factory;
pub mod generator;
pub mod memo_task;
pub mod retry;

pub use error::{WorkerError, WorkerResult};
pub use factory::{MemoGenerationEventHandler, MemoGenerationTaskFactory};
pub use generator::{Generator, HttpLlmClient, LlmClient, LlmGenerator};
pub use memo_task::{MemoGenerationPayload, MemoGenerationTask, MEMO_GENERATION_TASK_TYPE};
pub use retry::{GenerationError, RetryConfig};
