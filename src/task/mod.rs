//! # Tasks
//!
//! A [`Task`] wraps an opaque work body with an explicit lifecycle:
//!
//! ```text
//! Pending --dependencies resolved--> Ready --start--> Executing --complete/fail--> Finished
//!    |                                 |
//!    +------------cancel---------------+--------------------------------------> Cancelled
//! ```
//!
//! Tasks gate on other tasks through dependencies, can be finished manually
//! when asynchronous, and notify completion callbacks exactly once.

mod block;
mod context;
mod handle;
mod outcome;

pub use context::{FinishHandle, TaskContext};
pub use handle::{Task, TaskBuilder};
pub use outcome::{TaskId, TaskOutcome};

pub(crate) use handle::{Claim, TaskObserver};

use std::any::Any;

/// Render a caught panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
