//! Configuration Loader
//!
//! Layers defaults, an optional file, inline TOML and environment overrides
//! into a validated [`DispatchConfig`].

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::DispatchConfig;
use crate::constants::env;

/// Builder for loading a [`DispatchConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    inline: Vec<String>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            inline: Vec::new(),
            env_prefix: Some(env::CONFIG_PREFIX.to_string()),
        }
    }

    /// Read a file; the format follows its extension
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Layer inline TOML over the file
    pub fn with_toml(mut self, toml: impl Into<String>) -> Self {
        self.inline.push(toml.into());
        self
    }

    /// Read overrides from variables named `{prefix}__SECTION__FIELD`
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn load(&self) -> ConfigResult<DispatchConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigurationError::file_not_found(path.display().to_string()));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()));
        }

        for toml in &self.inline {
            builder = builder.add_source(File::from_str(toml, FileFormat::Toml));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator(env::CONFIG_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: DispatchConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            queue = %config.queue.name,
            max_concurrent = %config.queue.max_concurrent,
            "Configuration loaded successfully"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ConcurrencyLimit;
    use std::io::Write;

    #[test]
    fn test_empty_sources_yield_defaults() {
        let config = ConfigLoader::new().without_env().load().unwrap();
        assert_eq!(config, DispatchConfig::default());
    }

    #[test]
    fn test_file_then_inline_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[queue]\nname = \"from-file\"\nmax_concurrent = 3\n\n[events]\nchannel_capacity = 16"
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .with_toml("[queue]\nmax_concurrent = \"serial\"")
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.queue.name, "from-file");
        assert_eq!(config.queue.max_concurrent, ConcurrencyLimit::Serial);
        assert_eq!(config.events.channel_capacity, 16);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .with_file("/definitely/not/here.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigurationError::FileNotFound { .. })));
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("TASKER_DISPATCH_LOADER_TEST__QUEUE__MAX_CONCURRENT", "4");
        std::env::set_var("TASKER_DISPATCH_LOADER_TEST__QUEUE__START_SUSPENDED", "true");

        let config = ConfigLoader::new()
            .with_env_prefix("TASKER_DISPATCH_LOADER_TEST")
            .load()
            .unwrap();

        std::env::remove_var("TASKER_DISPATCH_LOADER_TEST__QUEUE__MAX_CONCURRENT");
        std::env::remove_var("TASKER_DISPATCH_LOADER_TEST__QUEUE__START_SUSPENDED");

        assert_eq!(config.queue.max_concurrent.max(), Some(4));
        assert!(config.queue.start_suspended);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let zero_limit = DispatchConfig::from_toml_str("[queue]\nmax_concurrent = 0");
        assert!(matches!(zero_limit, Err(ConfigurationError::LoadError { .. })));

        let zero_capacity = DispatchConfig::from_toml_str("[events]\nchannel_capacity = 0");
        assert!(matches!(
            zero_capacity,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
