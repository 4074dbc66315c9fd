//! # System Constants
//!
//! Event names, defaults and environment variable names that define the
//! operational boundaries of the dispatch framework.

/// Lifecycle events published by task queues
pub mod events {
    // Task lifecycle events
    pub const TASK_SUBMITTED: &str = "task.submitted";
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_CANCELLED: &str = "task.cancelled";

    // Queue lifecycle events
    pub const QUEUE_SUSPENDED: &str = "queue.suspended";
    pub const QUEUE_RESUMED: &str = "queue.resumed";
    pub const QUEUE_DRAINED: &str = "queue.drained";
}

/// System-wide defaults
pub mod system {
    /// Name given to queues built without configuration
    pub const DEFAULT_QUEUE_NAME: &str = "default";

    /// Prefix for queue worker thread names
    pub const DEFAULT_THREAD_NAME_PREFIX: &str = "tasker-worker";

    /// Idle time before a queue worker thread exits
    pub const DEFAULT_WORKER_KEEP_ALIVE_MS: u64 = 5_000;

    /// Capacity of each queue's lifecycle event channel
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1_000;

    /// Version compatibility marker
    pub const TASKER_DISPATCH_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Environment variables read by configuration and logging
pub mod env {
    /// Prefix for configuration overrides, e.g. `TASKER_DISPATCH__QUEUE__MAX_CONCURRENT`
    pub const CONFIG_PREFIX: &str = "TASKER_DISPATCH";

    /// Separator between nested configuration keys
    pub const CONFIG_SEPARATOR: &str = "__";

    /// Environment name used to pick the default log level
    pub const ENVIRONMENT: &str = "TASKER_DISPATCH_ENV";

    /// Fallback environment name
    pub const APP_ENVIRONMENT: &str = "APP_ENV";
}
