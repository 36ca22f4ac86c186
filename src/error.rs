//! Error types for ring lookups.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ring lookup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ring lookups.
///
/// A lookup either succeeds with a destination and a partition count, or
/// fails with exactly one of these.
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching a membership snapshot from a node failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A snapshot decoded fine but has no member that can own a key.
    #[error("ring is empty in snapshot from {addr}")]
    EmptyRing { addr: String },

    /// The overall lookup deadline expired before every fetch completed.
    #[error("lookup timed out after {after:?}")]
    Timeout { after: Duration },

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),

    /// Local I/O errors, such as failing to bind a responder.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures of a single snapshot fetch.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The address was unreachable, refused the connection or could not be resolved.
    #[error("connection failed to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// No response arrived within the deadline.
    #[error("no response from {addr} within {after:?}")]
    Timeout { addr: String, after: Duration },

    /// The peer sent a malformed or incompatible frame.
    #[error("protocol error from {addr}: {reason}")]
    Protocol { addr: String, reason: String },
}

impl TransportError {
    /// Build a connect error from an I/O failure.
    pub fn connect(addr: impl Into<String>, err: &io::Error) -> Self {
        TransportError::Connect {
            addr: addr.into(),
            reason: err.to_string(),
        }
    }

    /// Build a protocol error.
    pub fn protocol(addr: impl Into<String>, reason: impl ToString) -> Self {
        TransportError::Protocol {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// The address of the node the fetch was talking to.
    pub fn addr(&self) -> &str {
        match self {
            TransportError::Connect { addr, .. }
            | TransportError::Timeout { addr, .. }
            | TransportError::Protocol { addr, .. } => addr,
        }
    }

    /// Whether this is a per-fetch timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Coarse category of an [`Error`], for callers that branch on the failure
/// class rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connect,
    Timeout,
    Protocol,
    EmptyRing,
    Config,
    Internal,
}

impl Error {
    /// Categorize this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(TransportError::Connect { .. }) => ErrorKind::Connect,
            Error::Transport(TransportError::Timeout { .. }) | Error::Timeout { .. } => {
                ErrorKind::Timeout
            }
            Error::Transport(TransportError::Protocol { .. }) => ErrorKind::Protocol,
            Error::EmptyRing { .. } => ErrorKind::EmptyRing,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The failing address, where one applies.
    pub fn address(&self) -> Option<&str> {
        match self {
            Error::Transport(e) => Some(e.addr()),
            Error::EmptyRing { addr } => Some(addr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_address() {
        let err: Error = TransportError::Connect {
            addr: "10.0.0.1:3000".to_string(),
            reason: "refused".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Connect);
        assert_eq!(err.address(), Some("10.0.0.1:3000"));

        let err = Error::EmptyRing {
            addr: "10.0.0.2:3000".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::EmptyRing);
        assert_eq!(err.address(), Some("10.0.0.2:3000"));

        let err = Error::Timeout {
            after: Duration::from_secs(1),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.address().is_none());
    }

    #[test]
    fn test_display_includes_address() {
        let err = TransportError::protocol("127.0.0.1:1", "bad magic");
        assert_eq!(err.to_string(), "protocol error from 127.0.0.1:1: bad magic");
        assert!(!err.is_timeout());
    }
}
