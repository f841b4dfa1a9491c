//! Error type shared by every [`Session`](crate::Session) operation.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while spawning or driving a session.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The OS could not hand out a pseudo-terminal pair.
    #[error("Failed to allocate PTY: {reason}")]
    PtyAllocation { reason: String },

    /// The child program could not be started.
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The reader or writer thread hit a non-EOF I/O failure.
    ///
    /// Fatal to the session: every later call returns this same error.
    #[error("PTY I/O error: {0}")]
    Io(Arc<io::Error>),

    /// A deadline elapsed. The session is still usable.
    #[error("Timeout ({}s) exceeded waiting for {pattern}", .timeout.as_secs_f64())]
    Timeout { pattern: String, timeout: Duration },

    /// The session was cancelled, or the child ended, while `operation` was pending.
    #[error("Session cancelled while waiting for {operation}")]
    Cancelled { operation: String },
}

impl Error {
    /// `true` for errors a caller can simply retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_pattern_and_duration() {
        let err = Error::Timeout {
            pattern: "Password:".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Timeout (5s) exceeded waiting for Password:");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_fractional_timeout_message() {
        let err = Error::Timeout {
            pattern: "EOF".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Timeout (0.25s) exceeded waiting for EOF");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("gone"));
    }
}
