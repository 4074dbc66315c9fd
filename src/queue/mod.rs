//! # Task Queue
//!
//! Dispatches submitted tasks onto a per-queue worker pool while honoring a
//! [`ConcurrencyLimit`] and the dependencies declared on each task.
//!
//! The queue never owns a task's state: it observes the task's lifecycle
//! through a crate-internal observer and starts a task by claiming its body
//! once the task reports `Ready`.

pub mod errors;
pub mod limit;
pub mod task_queue;

pub use errors::{QueueError, QueueResult};
pub use limit::ConcurrencyLimit;
pub use task_queue::{QueueStats, TaskQueue};
