//! Error types for the Salvo client.

use thiserror::Error;

/// Errors that can occur while synchronizing with the Game Service.
#[derive(Debug, Error)]
pub enum SalvoError {
    /// The request could not be completed (connection refused, broken pipe, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The Game Service answered with a non-success HTTP status.
    #[error("game service returned status {status}: {reason}")]
    HttpStatus {
        /// Numeric status code, e.g. `500`.
        status: u16,
        /// Reason phrase from the status line (may be empty).
        reason: String,
    },

    /// A snapshot body did not parse into the expected shape or cell codes.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// A command reply was JSON but not the expected `{"response": ...}` shape.
    #[error("malformed command reply: {0}")]
    MalformedReply(String),

    /// Submitting a command to the Game Service failed.
    #[error("command `{command}` failed: {source}")]
    Dispatch {
        /// The command text that was being submitted.
        command: String,
        /// The underlying cause.
        #[source]
        source: Box<SalvoError>,
    },

    /// A coordinate fell outside the board.
    #[error("coordinate ({x}, {y}) is outside the {width}x{height} board")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// The session has ended; no further transitions are possible.
    #[error("session is over")]
    SessionOver,

    /// The operation requires an active session.
    #[error("session is not active")]
    NotActive,

    /// A request did not complete within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// Failed to serialize a request body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SalvoError {
    /// Returns `true` for failures of the request itself rather than of its content.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Timeout | Self::Io(_)
        )
    }

    /// Wrap `self` as the cause of a failed command submission.
    pub(crate) fn into_dispatch(self, command: impl Into<String>) -> Self {
        Self::Dispatch {
            command: command.into(),
            source: Box::new(self),
        }
    }
}

/// A specialized [`Result`] type for Salvo client operations.
pub type Result<T> = std::result::Result<T, SalvoError>;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_classification() {
        assert!(SalvoError::Transport("refused".into()).is_transport());
        assert!(SalvoError::Timeout.is_transport());
        assert!(!SalvoError::MalformedReply("{}".into()).is_transport());
        assert!(SalvoError::HttpStatus {
            status: 503,
            reason: "Service Unavailable".into()
        }
        .is_transport());
        assert!(!SalvoError::MalformedSnapshot("bad".into()).is_transport());
        assert!(!SalvoError::SessionOver.is_transport());
    }

    #[test]
    fn dispatch_error_keeps_its_cause() {
        let err = SalvoError::Timeout.into_dispatch("shot 1 2");
        assert_eq!(
            err.to_string(),
            "command `shot 1 2` failed: operation timed out"
        );
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "operation timed out");
    }

    #[test]
    fn out_of_bounds_message_names_the_board() {
        let err = SalvoError::OutOfBounds {
            x: 10,
            y: 3,
            width: 10,
            height: 10,
        };
        assert_eq!(
            err.to_string(),
            "coordinate (10, 3) is outside the 10x10 board"
        );
    }
}
