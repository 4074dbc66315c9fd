use thiserror::Error;

use crate::execution::WorkerPoolError;
use crate::state_machine::TaskState;
use crate::task::TaskId;

/// Errors raised by task queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Invalid concurrency limit {value}: must be at least 1")]
    InvalidConcurrency { value: usize },

    #[error("Task {task_id} is already owned by a queue")]
    AlreadyEnqueued { task_id: TaskId },

    #[error("Task {task_id} cannot be submitted in state {state}")]
    TaskNotSubmittable { task_id: TaskId, state: TaskState },

    #[error("Queue {queue} cannot be awaited from one of its own worker threads")]
    WaitFromWorker { queue: String },

    #[error("Queue {queue} failed to start a worker: {reason}")]
    WorkerUnavailable { queue: String, reason: String },
}

impl QueueError {
    pub(crate) fn worker_unavailable(queue: &str, error: &WorkerPoolError) -> Self {
        Self::WorkerUnavailable {
            queue: queue.to_string(),
            reason: error.to_string(),
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
