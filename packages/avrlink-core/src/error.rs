//! Centralized error types for the Avrlink core library.

use thiserror::Error;

/// Errors surfaced by sessions and the supervisor.
#[derive(Debug, Error)]
pub enum AvrError {
    /// The TCP connect did not complete within the configured timeout.
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    /// Any other transport failure (refused, reset, EOF mid-write).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A zone outside {Main, Zone2, Zone3} where a concrete zone is required.
    #[error("unknown zone")]
    UnknownZone,

    /// A channel code that is not part of the speaker vocabulary.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// A literal outside the closed set of the targeted property.
    #[error("unknown {kind} literal: {value}")]
    UnknownLiteral { kind: &'static str, value: String },

    /// A numeric argument that cannot be interpreted at all.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session is no longer alive; the command was not enqueued.
    #[error("session closed")]
    Closed,
}

impl AvrError {
    /// Machine-readable error code for host-facing reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Transport(_) => "transport_error",
            Self::UnknownZone => "unknown_zone",
            Self::UnknownChannel(_) => "unknown_channel",
            Self::UnknownLiteral { .. } => "unknown_literal",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Closed => "session_closed",
        }
    }
}

/// Convenient Result alias for session and supervisor operations.
pub type AvrResult<T> = Result<T, AvrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AvrError::UnknownZone.code(), "unknown_zone");
        assert_eq!(
            AvrError::UnknownChannel("XX".into()).code(),
            "unknown_channel"
        );
        assert_eq!(AvrError::Closed.code(), "session_closed");
    }
}
