use thiserror::Error;

use super::states::TaskState;
use crate::task::TaskId;

/// Errors raised by task state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: TaskState, event: String },

    #[error("Task {task_id} is owned by a queue and cannot be run manually")]
    OwnedByQueue { task_id: TaskId },

    #[error("Task {task_id} is synchronous and finishes when its work body returns")]
    NotAsynchronous { task_id: TaskId },

    #[error("Task {task_id} has no pending cancellation request to acknowledge")]
    CancellationNotRequested { task_id: TaskId },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
