use thiserror::Error;

/// Errors raised by the standalone synchronization primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Semaphore capacity must be non-negative, got {capacity}")]
    NegativeCapacity { capacity: i64 },

    #[error("Semaphore release without a matching acquire: {available}/{capacity} permits already available")]
    SemaphoreOverflow { available: usize, capacity: usize },

    #[error("Join group leave without a matching enter")]
    UnbalancedLeave,
}

pub type SyncResult<T> = Result<T, SyncError>;
