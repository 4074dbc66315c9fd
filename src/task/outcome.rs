use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::{TaskEvent, TaskState};

/// Opaque task identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal result of a task, delivered to completion callbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Work body returned successfully (or an asynchronous task was finished)
    Succeeded,
    /// Work body returned an error or panicked
    Failed(String),
    /// Task was cancelled before it started, or its body stopped on request
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// The terminal state a task holding this outcome is in
    pub fn state(&self) -> TaskState {
        match self {
            Self::Succeeded | Self::Failed(_) => TaskState::Finished,
            Self::Cancelled => TaskState::Cancelled,
        }
    }

    /// Lifecycle event name used when publishing this outcome
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Succeeded => crate::constants::events::TASK_COMPLETED,
            Self::Failed(_) => crate::constants::events::TASK_FAILED,
            Self::Cancelled => crate::constants::events::TASK_CANCELLED,
        }
    }

    pub(crate) fn to_event(&self) -> TaskEvent {
        match self {
            Self::Succeeded => TaskEvent::Complete,
            Self::Failed(msg) => TaskEvent::fail_with_error(msg.as_str()),
            Self::Cancelled => TaskEvent::Cancel,
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
