//! Error types for configuration operations.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::validation::ValidationError;

/// The filesystem operation behind a [`ConfigError::Io`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// Reading a config file.
    Read,
    /// Writing a config file.
    Write,
    /// Creating the config directory.
    CreateDir,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileOp::Read => "read",
            FileOp::Write => "write",
            FileOp::CreateDir => "create directory",
        })
    }
}

/// Loading, saving, or applying a configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The filesystem refused.
    #[error("cannot {op} '{}': {source}", path.display())]
    Io {
        /// What was attempted.
        op: FileOp,
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Not TOML, or not the expected shape.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization to TOML failed.
    #[error("cannot encode config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Well-formed, but out of range.
    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
}

impl ConfigError {
    fn io(op: FileOp, path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read_file(path: &Path, source: std::io::Error) -> Self {
        Self::io(FileOp::Read, path, source)
    }

    pub(crate) fn write_file(path: &Path, source: std::io::Error) -> Self {
        Self::io(FileOp::Write, path, source)
    }

    pub(crate) fn create_dir(path: &Path, source: std::io::Error) -> Self {
        Self::io(FileOp::CreateDir, path, source)
    }

    /// True when the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn io_errors_name_the_operation_and_path() {
        let err = ConfigError::read_file(Path::new("/etc/sluice.toml"), io::Error::from(io::ErrorKind::NotFound));
        let msg = err.to_string();
        assert!(msg.starts_with("cannot read '/etc/sluice.toml'"), "got: {msg}");
        assert!(err.source().is_some());
        assert!(err.is_not_found());

        let err = ConfigError::create_dir(Path::new("/ro"), io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().contains("create directory"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn validation_errors_pass_through() {
        let err = ConfigError::from(ValidationError::ZeroBatch);
        assert_eq!(err.to_string(), "invalid config: scheduler.max_batch must be at least 1");
    }
}
