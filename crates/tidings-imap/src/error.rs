//! Error types for the IMAP command engine.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving an IMAP command.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying transport, passed through unmodified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The command was used incorrectly (tag misuse, invalid arguments).
    #[error("Usage error: {0}")]
    Usage(String),

    /// The server broke protocol sequencing or rejected the request as
    /// malformed or unsupported.
    #[error("Server error: {0}")]
    Server(String),

    /// The server understood the request but refused it (NO without a
    /// classified response code).
    #[error("Operation failed: {0}")]
    Operational(String),

    /// The server rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// The server reported that it cannot serve the request right now.
    #[error("Server unavailable: {0}")]
    Unavailable(String),

    /// The connection dropped before the command completed.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// No traffic was seen within the response timeout.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was cancelled.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Returns `true` for errors in the "unavailable" class, which includes
    /// a lost connection.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::NotConnected(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_is_unavailable() {
        assert!(Error::NotConnected("socket closed".into()).is_unavailable());
        assert!(Error::Unavailable("maintenance".into()).is_unavailable());
        assert!(!Error::Server("BAD".into()).is_unavailable());
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn timeout_message_mentions_duration() {
        let err = Error::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Command timed out after 30s");
    }
}
