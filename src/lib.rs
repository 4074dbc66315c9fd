#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Dispatch
//!
//! Cancelable task execution primitives for in-process concurrency.
//!
//! ## Overview
//!
//! Tasker Dispatch packages the recurring pattern of "run these units of work,
//! some of which wait on others, never more than N at a time, and tell me when
//! they are done" into a small set of primitives with explicit state and
//! explicit errors.
//!
//! ## Key Features
//!
//! - **Task state machine**: `Pending → Ready → Executing → Finished`, with
//!   `Cancelled` reachable before execution and, cooperatively, during it
//! - **Dependencies**: a task becomes ready only once every dependency is terminal
//! - **Bounded queues**: serial, bounded or unbounded concurrency on a per-queue
//!   worker pool, with suspension and lifecycle events
//! - **Semaphore**: FIFO counting semaphore with RAII permits
//! - **Join groups**: enter/leave counting with a notify-once callback
//!
//! ## Module Organization
//!
//! - [`task`] - Task handles, builders, outcomes and execution contexts
//! - [`state_machine`] - Lifecycle states, events and the transition table
//! - [`queue`] - Task queues and concurrency limits
//! - [`sync`] - Semaphore and join group primitives
//! - [`notification`] - Execution contexts for completion callbacks
//! - [`execution`] - Per-queue worker pools
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error aggregation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use tasker_dispatch::{ConcurrencyLimit, Task, TaskQueue};
//!
//! # fn main() -> tasker_dispatch::Result<()> {
//! let queue = TaskQueue::new(ConcurrencyLimit::bounded(2)?);
//!
//! let download = Task::builder()
//!     .name("download")
//!     .build(|_| std::thread::sleep(Duration::from_millis(10)));
//! let resize = Task::builder()
//!     .name("resize")
//!     .depends_on(&download)
//!     .build(|_| println!("resizing"));
//!
//! resize.on_completion(|outcome| println!("resize: {outcome}"));
//!
//! queue.submit_all([&download, &resize])?;
//! queue.wait_until_all_finished()?;
//! assert!(resize.outcome().unwrap().is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod notification;
pub mod queue;
pub mod state_machine;
pub mod sync;
pub mod task;

pub use config::{ConfigurationError, DispatchConfig};
pub use error::{DispatchError, Result};
pub use events::{EventPublisher, PublishedEvent};
pub use notification::{Notifier, NotifyContext};
pub use queue::{ConcurrencyLimit, QueueError, QueueStats, TaskQueue};
pub use state_machine::{StateMachineError, TaskEvent, TaskState};
pub use sync::{GroupMember, JoinGroup, Semaphore, SemaphorePermit, SyncError};
pub use task::{FinishHandle, Task, TaskBuilder, TaskContext, TaskId, TaskOutcome};
