//! Server messages delivered to a command.
//!
//! These are produced by the response deserializer owned by the session and
//! handed to [`Command`](crate::Command) through its response-intake methods.

use crate::types::{ResponseCode, Status, Tag};

/// Tagged status response terminating a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Tag echoed by the server.
    pub tag: Tag,
    /// Completion status.
    pub status: Status,
    /// Optional bracketed response code.
    pub code: Option<ResponseCode>,
    /// Optional human-readable text.
    pub text: Option<String>,
}

impl StatusResponse {
    /// Creates a status response without a code or text.
    #[must_use]
    pub const fn new(tag: Tag, status: Status) -> Self {
        Self {
            tag,
            status,
            code: None,
            text: None,
        }
    }

    /// Attaches a response code.
    #[must_use]
    pub fn with_code(mut self, code: ResponseCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches human-readable text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Returns `true` if this response can terminate a command.
    #[must_use]
    pub const fn is_completion(&self) -> bool {
        self.tag.is_assigned() && self.status.is_completion()
    }

    /// Returns the text, or an empty string.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

impl std::fmt::Display for StatusResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tag, self.status)?;
        if let Some(code) = &self.code {
            write!(f, " {code}")?;
        }
        if let Some(text) = &self.text {
            write!(f, " {text}")?;
        }
        Ok(())
    }
}

/// Untagged server data associated with a command.
///
/// The command only treats it as a liveness signal; interpretation belongs
/// to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerData {
    /// The response line without the leading `* `.
    pub line: String,
}

impl ServerData {
    /// Creates server data from a response line.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }
}

/// Continuation request (`+ ...`) from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationResponse {
    /// Optional text after the `+`.
    pub text: Option<String>,
}

impl ContinuationResponse {
    /// Creates a continuation with the given text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}
