use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ConfigError;
use crate::domain::models::config::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .metaswarm/config.yaml (project config)
    /// 3. .metaswarm/local.yaml (project local overrides, optional)
    /// 4. Environment variables (METASWARM_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".metaswarm/config.yaml"))
            .merge(Yaml::file(".metaswarm/local.yaml"))
            .merge(Env::prefixed("METASWARM_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("METASWARM_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::parameter(
                "logging.level",
                format!(
                    "{} is not one of: {}",
                    config.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::parameter(
                "logging.format",
                format!("{} is not one of: json, pretty", config.logging.format),
            ));
        }

        if config.runtime.command_buffer == 0 {
            return Err(ConfigError::parameter(
                "runtime.command_buffer",
                "must be at least 1",
            ));
        }

        if config.runtime.event_capacity == 0 {
            return Err(ConfigError::parameter(
                "runtime.event_capacity",
                "must be at least 1",
            ));
        }

        if config
            .runtime
            .checkpoint_dir
            .as_deref()
            .is_some_and(|dir| dir.trim().is_empty())
        {
            return Err(ConfigError::parameter(
                "runtime.checkpoint_dir",
                "cannot be empty when set",
            ));
        }

        if config.fault_tolerance.health_check_interval_secs == 0 {
            return Err(ConfigError::parameter(
                "fault_tolerance.health_check_interval_secs",
                "must be at least 1",
            ));
        }

        if config.fault_tolerance.checkpoint_interval_secs == 0 {
            return Err(ConfigError::parameter(
                "fault_tolerance.checkpoint_interval_secs",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}
