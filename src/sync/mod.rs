//! # Synchronization Primitives
//!
//! Leaf primitives usable with or without a [`TaskQueue`](crate::queue::TaskQueue):
//! a bounded counting [`Semaphore`] for throttling and a [`JoinGroup`] that
//! notifies once a set of enter/leave events balances.

pub mod errors;
pub mod join_group;
pub mod semaphore;

pub use errors::{SyncError, SyncResult};
pub use join_group::{GroupMember, JoinGroup};
pub use semaphore::{Semaphore, SemaphorePermit};
