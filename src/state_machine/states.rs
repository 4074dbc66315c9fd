use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a [`Task`](crate::task::Task)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting on one or more dependencies to reach a terminal state
    Pending,
    /// All dependencies resolved, eligible for scheduling
    Ready,
    /// Work body has been invoked and the task has not yet finished
    Executing,
    /// Work body completed, successfully or with an error
    Finished,
    /// Task was cancelled before it started or stopped early on request
    Cancelled,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Check if a scheduler may start the task from this state
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if this state satisfies a dependency held by another task
    pub fn satisfies_dependencies(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Executing => write!(f, "executing"),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "executing" => Ok(Self::Executing),
            "finished" => Ok(Self::Finished),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Default state for new tasks
impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_terminal_check() {
        assert!(TaskState::Finished.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Ready.is_terminal());
        assert!(!TaskState::Executing.is_terminal());
    }

    #[test]
    fn test_dependency_satisfaction() {
        assert!(TaskState::Finished.satisfies_dependencies());
        assert!(TaskState::Cancelled.satisfies_dependencies());
        assert!(!TaskState::Executing.satisfies_dependencies());
        assert!(!TaskState::Ready.satisfies_dependencies());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(TaskState::Executing.to_string(), "executing");
        assert_eq!("ready".parse::<TaskState>().unwrap(), TaskState::Ready);
        assert!("in_progress".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&TaskState::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");

        let parsed: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskState::Cancelled);
    }
}
