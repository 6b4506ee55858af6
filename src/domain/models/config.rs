use serde::{Deserialize, Serialize};

/// Main configuration structure for metaswarm
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Swarm runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Fault tolerance supervisor configuration
    #[serde(default)]
    pub fault_tolerance: FaultToleranceConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Swarm runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Write a checkpoint after every swarm mutation
    #[serde(default = "default_auto_persist")]
    pub auto_persist: bool,

    /// Directory for checkpoint files (in-memory store when unset)
    #[serde(default)]
    pub checkpoint_dir: Option<String>,

    /// Pause between algorithm iterations, in milliseconds
    #[serde(default)]
    pub iteration_pause_ms: u64,

    /// Capacity of each swarm actor's command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Capacity of the notification broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

const fn default_auto_persist() -> bool {
    true
}

const fn default_command_buffer() -> usize {
    256
}

const fn default_event_capacity() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            auto_persist: default_auto_persist(),
            checkpoint_dir: None,
            iteration_pause_ms: 0,
            command_buffer: default_command_buffer(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Fault tolerance supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FaultToleranceConfig {
    /// Seconds between agent health-check passes
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Seconds between periodic checkpoints
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,

    /// Consecutive failed checks tolerated before an agent is evicted
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

const fn default_health_check_interval_secs() -> u64 {
    10
}

const fn default_checkpoint_interval_secs() -> u64 {
    60
}

const fn default_max_failures() -> u32 {
    3
}

impl Default for FaultToleranceConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval_secs(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            max_failures: default_max_failures(),
        }
    }
}
