use super::{Task, TaskId};
use crate::state_machine::StateMachineResult;

/// View of the running task handed to its work body
///
/// Cancellation of an executing task is advisory: bodies that care poll
/// [`TaskContext::is_cancelled`] and return early on their own. A body that
/// returns normally once cancellation was requested ends `Cancelled`.
#[derive(Debug)]
pub struct TaskContext {
    task: Task,
}

impl TaskContext {
    pub(crate) fn new(task: Task) -> Self {
        Self { task }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.task.name()
    }

    /// Whether cancellation has been requested for this task
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Handle used by asynchronous tasks to signal completion from elsewhere
    pub fn finish_handle(&self) -> FinishHandle {
        FinishHandle {
            task: self.task.clone(),
        }
    }
}

/// Completion signal for an asynchronous task
///
/// Cloneable and `Send`, so it can move to another thread or into a callback
/// owned by a subsystem the framework never sees.
#[derive(Debug, Clone)]
pub struct FinishHandle {
    task: Task,
}

impl FinishHandle {
    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Mark the task finished successfully
    pub fn finish(&self) -> StateMachineResult<()> {
        self.task.finish()
    }

    /// Mark the task finished with an error
    pub fn fail(&self, error: impl Into<String>) -> StateMachineResult<()> {
        self.task.fail(error)
    }

    /// Acknowledge a cancellation request and release the task's queue slot
    pub fn finish_cancelled(&self) -> StateMachineResult<()> {
        self.task.finish_cancelled()
    }
}
