//! Lifecycle event publishing for task queues

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};
