//! Error type for the wire protocol, server, and clients.

use sluice_core::CouplingError;
use thiserror::Error;

/// Failures talking to (or serving) a remote peer.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Socket failure, including read timeouts.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer sent something the protocol does not allow.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The peer understood the request and declined it.
    #[error("remote refused: {0}")]
    Refused(String),
    /// No session has this key (or it was reaped).
    #[error("unknown session {0:#010x}")]
    UnknownSession(u32),
}

impl RemoteError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        RemoteError::Protocol(msg.into())
    }
}

impl From<RemoteError> for CouplingError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Refused(msg) => CouplingError::Refused(msg),
            other => CouplingError::Lost(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_refusals_keep_the_worker() {
        let refused: CouplingError = RemoteError::Refused("bad hop".into()).into();
        assert_eq!(refused, CouplingError::Refused("bad hop".into()));

        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "stalled");
        let lost: CouplingError = RemoteError::Io(timeout).into();
        assert!(matches!(lost, CouplingError::Lost(msg) if msg.contains("stalled")));
    }
}
