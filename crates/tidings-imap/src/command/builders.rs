//! Typed constructors for common commands.

use super::{Command, Literal, Parameter};
use crate::config::CommandConfig;

impl Command {
    /// NOOP command.
    #[must_use]
    pub fn noop() -> Self {
        Self::new("NOOP", [])
    }

    /// CAPABILITY command.
    #[must_use]
    pub fn capability() -> Self {
        Self::new("CAPABILITY", [])
    }

    /// LOGOUT command.
    #[must_use]
    pub fn logout() -> Self {
        Self::new("LOGOUT", [])
    }

    /// LOGIN command. Credentials are never shown in `Display` output.
    #[must_use]
    pub fn login(username: &str, password: &str) -> Self {
        Self::new("LOGIN", [username.into(), password.into()])
    }

    /// SELECT command.
    #[must_use]
    pub fn select(mailbox: &str) -> Self {
        Self::new("SELECT", [mailbox.into()])
    }

    /// EXAMINE command (read-only SELECT).
    #[must_use]
    pub fn examine(mailbox: &str) -> Self {
        Self::new("EXAMINE", [mailbox.into()])
    }

    /// APPEND command uploading `message` as a literal.
    ///
    /// An empty `flags` slice omits the flag list.
    #[must_use]
    pub fn append(mailbox: &str, flags: &[&str], message: Literal) -> Self {
        let mut args = vec![Parameter::from(mailbox)];
        if !flags.is_empty() {
            args.push(Parameter::list(flags.iter().map(|f| Parameter::atom(*f))));
        }
        args.push(Parameter::Literal(message));
        Self::new("APPEND", args)
    }

    /// IDLE command (RFC 2177).
    ///
    /// After sending, [`send_wait`](Self::send_wait) holds the pipeline until
    /// [`exit_idle`](Self::exit_idle) is called or the server completes the
    /// command.
    #[must_use]
    pub fn idle() -> Self {
        Self::idle_with_config(&CommandConfig::default())
    }

    /// IDLE command with explicit settings.
    #[must_use]
    pub fn idle_with_config(config: &CommandConfig) -> Self {
        Self::build("IDLE".to_string(), Vec::new(), config, true)
    }
}

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
    use crate::types::Tag;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::noop().name(), "NOOP");
        assert_eq!(Command::capability().name(), "CAPABILITY");
        assert!(Command::logout().args().is_empty());
        assert_eq!(Command::select("INBOX").to_string(), "---- SELECT INBOX");
        assert_eq!(Command::examine("Sent Items").to_string(), "---- EXAMINE \"Sent Items\"");
    }

    #[test]
    fn test_login_redacts_credentials() {
        let cmd = Command::login("user@example.com", "hunter2");
        cmd.assign_tag(Tag::new("A0001")).unwrap();
        let shown = cmd.to_string();
        assert_eq!(shown, "A0001 LOGIN user@example.com <redacted>");
        assert!(!format!("{cmd:?}").contains("hunter2"));
    }

    #[test]
    fn test_append_layout() {
        let cmd = Command::append("INBOX", &["\\Seen"], Literal::new("hello"));
        assert_eq!(cmd.args().len(), 3);
        assert_eq!(cmd.to_string(), "---- APPEND INBOX (\\Seen) {5}");

        let cmd = Command::append("INBOX", &[], Literal::new("hello"));
        assert_eq!(cmd.to_string(), "---- APPEND INBOX {5}");
    }

    #[test]
    fn test_only_idle_has_idle_gate() {
        assert!(Command::idle().inner.idle.is_some());
        assert!(Command::noop().inner.idle.is_none());
        assert!(Command::noop().exit_idle().is_err());
    }
}
