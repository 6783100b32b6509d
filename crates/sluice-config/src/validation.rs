//! Range checks for configuration values.
//!
//! Parsing only proves a file is well-formed TOML of the right shape; these
//! checks reject values no server or scheduler could run with.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::SluiceConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// `server.bind` is not an IP address.
    #[error("server.bind '{0}' is not an IP address")]
    BadBindAddress(String),

    /// Sessions would be reaped the moment they open.
    #[error("server.sweep_interval_secs must be at least 1")]
    ZeroSweepInterval,

    /// Remote workers would be declared lost before answering.
    #[error("server.stall_timeout_ms must be at least 1")]
    ZeroStallTimeout,

    /// A batch must hold at least one chunk.
    #[error("scheduler.max_batch must be at least 1")]
    ZeroBatch,

    /// Weighting is a blend between 0 and 1.
    #[error("scheduler.weighting {0} is outside [0, 1]")]
    WeightingOutOfRange(f32),

    /// Buffers need room for at least one word.
    #[error("buffers.default_words must be at least 1")]
    ZeroBufferWords,

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks every section, reporting all problems at once.
pub fn validate(config: &SluiceConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if config.server.bind.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress(config.server.bind.clone()));
    }
    if config.server.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.server.stall_timeout_ms == 0 {
        errors.push(ValidationError::ZeroStallTimeout);
    }
    if config.scheduler.max_batch == 0 {
        errors.push(ValidationError::ZeroBatch);
    }
    if !(0.0..=1.0).contains(&config.scheduler.weighting) {
        errors.push(ValidationError::WeightingOutOfRange(config.scheduler.weighting));
    }
    if config.buffers.default_words == 0 {
        errors.push(ValidationError::ZeroBufferWords);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
