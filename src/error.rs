//! Crate-level error type
//!
//! Each module reports its own error enum; [`DispatchError`] gathers them for
//! callers that want a single `?`-compatible type.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::execution::WorkerPoolError;
use crate::notification::NotificationError;
use crate::queue::QueueError;
use crate::state_machine::StateMachineError;
use crate::sync::SyncError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("State transition error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Synchronization error: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] WorkerPoolError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
