//! Configuration for sluice servers and schedulers.
//!
//! One TOML file, `config.toml`, with three sections:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 16661
//! sweep_interval_secs = 30
//! stall_timeout_ms = 10000
//!
//! [scheduler]
//! max_batch = 8
//! max_in_flight = 0        # 0 = twice the total worker pipeline depth
//! weighting = 0.5          # 0 = latency, 1 = throughput
//!
//! [buffers]
//! default_words = 65536
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice_config::{SluiceConfig, default_config_path};
//!
//! let config = SluiceConfig::load_or_default(default_config_path()).unwrap();
//! let pool_options = config.pool_options();
//! let server_options = config.server_options().unwrap();
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

/// Range checks for configuration values.
pub mod validation;

pub use config::{BuffersConfig, SchedulerConfig, ServerConfig, SluiceConfig};
pub use error::{ConfigError, FileOp};
pub use paths::{default_config_path, ensure_user_config_dir, user_config_dir};
pub use validation::{ValidationError, ValidationResult, validate};
