use serde::{Deserialize, Serialize};

/// Events that can trigger task state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Every dependency has reached a terminal state
    DependenciesResolved,
    /// A scheduler (or a manual `run`) selected the task
    Start,
    /// The work body signalled success
    Complete,
    /// The work body returned an error or panicked
    Fail(String),
    /// Cancel a task that has not started, or one whose body stopped early
    Cancel,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DependenciesResolved => "dependencies_resolved",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(TaskEvent::fail_with_error("boom").error_message(), Some("boom"));
        assert_eq!(TaskEvent::Complete.error_message(), None);
        assert_eq!(TaskEvent::Fail(String::new()).event_type(), "fail");
    }
}
