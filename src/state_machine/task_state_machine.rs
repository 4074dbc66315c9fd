use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskState,
};
use tracing::debug;

/// Transition table for a single task's lifecycle
///
/// Holds no locks of its own; the owning [`Task`](crate::task::Task) keeps it
/// behind its core mutex so every transition is atomic with respect to
/// concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct TaskStateMachine {
    state: TaskState,
}

impl TaskStateMachine {
    /// Create a new task state machine in the `Pending` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state of the task
    pub fn current_state(&self) -> TaskState {
        self.state
    }

    /// Attempt to transition the task state
    pub fn transition(&mut self, event: &TaskEvent) -> StateMachineResult<TaskState> {
        let current_state = self.state;
        let target_state = Self::determine_target_state(current_state, event)?;

        debug!(
            from = %current_state,
            to = %target_state,
            event = event.event_type(),
            error = event.error_message(),
            "Task state transition"
        );

        self.state = target_state;
        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: TaskState,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskState> {
        let target = match (current_state, event) {
            // Readiness gating
            (TaskState::Pending, TaskEvent::DependenciesResolved) => TaskState::Ready,

            // Start transitions
            (TaskState::Ready, TaskEvent::Start) => TaskState::Executing,

            // Completion transitions, both outcomes land in Finished
            (TaskState::Executing, TaskEvent::Complete) => TaskState::Finished,
            (TaskState::Executing, TaskEvent::Fail(_)) => TaskState::Finished,

            // Cancel transitions; the task layer only cancels an executing
            // task once its body has stopped cooperatively
            (TaskState::Pending, TaskEvent::Cancel) => TaskState::Cancelled,
            (TaskState::Ready, TaskEvent::Cancel) => TaskState::Cancelled,
            (TaskState::Executing, TaskEvent::Cancel) => TaskState::Cancelled,

            // Invalid transitions
            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state,
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}
