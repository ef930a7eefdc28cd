//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `datapool.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;
use std::time::Duration;

use datapool_app::config::{DEFAULT_IDLE_TIMEOUT, ExecutorConfig, PipelineConfig};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline worker settings.
    pub pipeline: PipelineSection,
    /// Listener dispatch pool settings.
    pub dispatch: DispatchSection,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated robot settings.
    #[serde(rename = "virtual")]
    pub virtual_robot: VirtualConfig,
    /// Devices served by this daemon.
    pub devices: Vec<DeviceEntry>,
}

/// `[pipeline]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Longest wait of a pipeline worker between stop-flag checks.
    pub poll_interval_ms: u64,
}

/// `[dispatch]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// How long an idle dispatch thread lingers before it exits.
    pub idle_timeout_ms: u64,
    /// How long shutdown waits for queued listener callbacks to finish.
    pub shutdown_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// `[virtual]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Attach a simulated robot to every device.
    pub enabled: bool,
    /// Period of the simulated temperature sensor.
    pub sensor_period_ms: u64,
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
}

impl Config {
    /// Load configuration from `datapool.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("datapool.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATAPOOL_POLL_INTERVAL_MS")
            && let Ok(ms) = val.parse()
        {
            self.pipeline.poll_interval_ms = ms;
        }
        if let Ok(val) = std::env::var("DATAPOOL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "pipeline.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.dispatch.idle_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "dispatch.idle_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.virtual_robot.enabled && self.virtual_robot.sensor_period_ms == 0 {
            return Err(ConfigError::Validation(
                "virtual.sensor_period_ms must be non-zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "device names must not be empty".to_string(),
                ));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "device {:?} is configured twice",
                    device.name
                )));
            }
        }
        Ok(())
    }

    /// Settings for every datapool's pipelines.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_millis(self.pipeline.poll_interval_ms),
        }
    }

    /// Settings for the shared dispatch pool.
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            idle_timeout: Duration::from_millis(self.dispatch.idle_timeout_ms),
            ..ExecutorConfig::default()
        }
    }

    /// Grace period for draining the dispatch pool on shutdown.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch.shutdown_timeout_ms)
    }

    #[must_use]
    pub fn sensor_period(&self) -> Duration {
        Duration::from_millis(self.virtual_robot.sensor_period_ms)
    }

    /// Configured device names, in file order.
    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.name.as_str())
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
        }
    }
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            idle_timeout_ms: u64::try_from(DEFAULT_IDLE_TIMEOUT.as_millis()).unwrap_or(60_000),
            shutdown_timeout_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "datapoold=info,datapool_app=info,datapool_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensor_period_ms: 1000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
