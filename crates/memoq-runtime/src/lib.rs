//! Durable task runner core: store, bounded queue, worker pool, stuck-task
//! reaper, and event bus. Domain-agnostic — nothing here knows what a memo
//! or a card is; `memoq-worker` supplies the one concrete `Task`
//! implementation this system runs.

pub mod error;
pub mod event_bus;
pub mod pool;
pub mod queue;
pub mod runner;
pub mod store;
pub mod task;

pub use error::{RuntimeError, RuntimeResult};
pub use event_bus::{EventBus, TaskRequestHandler};
pub use queue::{QueuedTask, TaskQueue, TaskQueueReceiver};
pub use runner::{Runner, TaskRehydrator};
pub use store::{InMemoryTaskStore, PostgresTaskStore, TaskStore};
pub use task::{Task, TaskRow, TaskStatus};
