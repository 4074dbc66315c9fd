//! # Dispatch Configuration
//!
//! Typed configuration for queues, lifecycle events and logging. Every field
//! has a default, so an empty source yields a working configuration.
//!
//! ## Sources
//!
//! Layered with the `config` crate, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional file (TOML, YAML or JSON, picked by extension)
//! 3. environment variables prefixed `TASKER_DISPATCH`, nested with `__`
//!    (`TASKER_DISPATCH__QUEUE__MAX_CONCURRENT=4`)
//!
//! ## Usage
//!
//! ```rust
//! use tasker_dispatch::config::DispatchConfig;
//! use tasker_dispatch::TaskQueue;
//!
//! let config = DispatchConfig::from_toml_str(
//!     r#"
//!     [queue]
//!     name = "thumbnails"
//!     max_concurrent = 2
//!     "#,
//! )
//! .unwrap();
//!
//! let queue = TaskQueue::from_config(&config);
//! assert_eq!(queue.name(), "thumbnails");
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::system;
use crate::queue::ConcurrencyLimit;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Queue construction settings
    pub queue: QueueConfig,

    /// Lifecycle event channel settings
    pub events: EventConfig,

    /// Structured logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, used in logs, events and worker thread names
    pub name: String,
    /// `"serial"`, `"unbounded"` or a positive count
    pub max_concurrent: ConcurrencyLimit,
    /// Create the queue suspended
    pub start_suspended: bool,
    /// Idle time before a worker thread exits
    pub worker_keep_alive_ms: u64,
    pub thread_name_prefix: String,
}

impl QueueConfig {
    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_millis(self.worker_keep_alive_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: system::DEFAULT_QUEUE_NAME.to_string(),
            max_concurrent: ConcurrencyLimit::default(),
            start_suspended: false,
            worker_keep_alive_ms: system::DEFAULT_WORKER_KEEP_ALIVE_MS,
            thread_name_prefix: system::DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventConfig {
    /// Broadcast buffer per queue; lagging subscribers drop the oldest events
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: system::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; when unset the level follows the environment
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl DispatchConfig {
    /// Load from defaults and environment overrides
    pub fn load() -> ConfigResult<Self> {
        ConfigLoader::new().load()
    }

    /// Load from a file, with environment overrides on top
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        ConfigLoader::new().with_file(path).load()
    }

    /// Parse inline TOML without consulting the environment
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        ConfigLoader::new().with_toml(toml).without_env().load()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.queue.name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "queue.name",
                "queue configuration",
            ));
        }

        if self.queue.worker_keep_alive_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.worker_keep_alive_ms",
                "0",
                "keep-alive must be greater than 0",
            ));
        }

        if self.queue.thread_name_prefix.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "queue.thread_name_prefix",
                "queue configuration",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.name, "default");
        assert_eq!(config.queue.max_concurrent, ConcurrencyLimit::Unbounded);
        assert_eq!(config.queue.worker_keep_alive(), Duration::from_millis(5000));
    }

    #[test]
    fn test_validation_rejects_zero_keep_alive() {
        let mut config = DispatchConfig::default();
        config.queue.worker_keep_alive_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. }) if field == "queue.worker_keep_alive_ms"
        ));
    }

    #[test]
    fn test_validation_rejects_blank_name() {
        let mut config = DispatchConfig::default();
        config.queue.name = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{"queue": {"max_concurrent": "serial"}}"#).unwrap();
        assert!(config.queue.max_concurrent.is_serial());
        assert_eq!(config.events.channel_capacity, 1000);
        assert!(!config.logging.json);
    }
}
