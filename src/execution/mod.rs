//! # Execution Substrate
//!
//! Each [`TaskQueue`](crate::queue::TaskQueue) owns a [`WorkerPool`]; there is
//! no process-wide scheduler.

pub mod worker_pool;

pub use worker_pool::{Job, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStats};
