//! The `config.toml` schema.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sluice_core::{DEFAULT_BUFFER_WORDS, PoolOptions};
use sluice_remote::{DEFAULT_PORT, ServerOptions};

use crate::error::ConfigError;
use crate::validation::{self, ValidationError};

/// Session server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Sessions without a keep-alive for this long are reaped.
    pub sweep_interval_secs: u64,
    /// A remote worker silent for this long is declared lost.
    pub stall_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            sweep_interval_secs: 30,
            stall_timeout_ms: 10_000,
        }
    }
}

/// Worker pool scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Largest batch, in chunks.
    pub max_batch: usize,
    /// Batches in flight; 0 means twice the total worker pipeline depth.
    pub max_in_flight: usize,
    /// 0 favours latency, 1 favours throughput.
    pub weighting: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let options = PoolOptions::default();
        Self {
            max_batch: options.max_batch,
            max_in_flight: options.max_in_flight,
            weighting: options.weighting,
        }
    }
}

/// Ring buffer sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffersConfig {
    /// Words per connection buffer unless a processor asks for more.
    pub default_words: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            default_words: DEFAULT_BUFFER_WORDS,
        }
    }
}

/// Everything `config.toml` can hold. Missing sections and keys take their
/// defaults.
///
/// # Example
///
/// ```rust
/// use sluice_config::SluiceConfig;
///
/// let config = SluiceConfig::from_toml("[scheduler]\nweighting = 0.0\n").unwrap();
/// assert_eq!(config.pool_options().batch_size(), 1);
/// assert_eq!(config.server.port, 16661);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SluiceConfig {
    /// `[server]`
    pub server: ServerConfig,
    /// `[scheduler]`
    pub scheduler: SchedulerConfig,
    /// `[buffers]`
    pub buffers: BuffersConfig,
}

impl SluiceConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: SluiceConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Range-check every value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }

    /// Scheduler settings for new worker pools.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_batch: self.scheduler.max_batch,
            max_in_flight: self.scheduler.max_in_flight,
            weighting: self.scheduler.weighting,
            stall_timeout: self.stall_timeout(),
        }
    }

    /// Settings for a [`SessionServer`](sluice_remote::SessionServer).
    pub fn server_options(&self) -> Result<ServerOptions, ConfigError> {
        let bind: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| ValidationError::BadBindAddress(self.server.bind.clone()))?;
        Ok(ServerOptions {
            bind,
            port: self.server.port,
            sweep_interval: Duration::from_secs(self.server.sweep_interval_secs),
            stall_timeout: self.stall_timeout(),
            default_words: self.buffers.default_words,
        })
    }

    fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.server.stall_timeout_ms)
    }
}
