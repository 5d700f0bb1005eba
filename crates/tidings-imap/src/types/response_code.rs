//! Response codes.

/// Response code from a status response.
///
/// These provide additional information about command completion. The
/// classified failure codes come from RFC 5530.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// PARSE: Error parsing message.
    Parse,
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// ALREADYEXISTS: The object being created already exists.
    AlreadyExists,
    /// AUTHENTICATIONFAILED: Credentials were rejected.
    AuthenticationFailed,
    /// AUTHORIZATIONFAILED: Authenticated, but not allowed to act as the
    /// requested identity.
    AuthorizationFailed,
    /// CANNOT: The operation violates an invariant of the server.
    Cannot,
    /// LIMIT: A server-imposed limit was reached.
    Limit,
    /// NOPERM: Access control forbids the operation.
    NoPerm,
    /// NONEXISTENT: The target does not exist.
    NonExistent,
    /// OVERQUOTA: The user would exceed a quota.
    OverQuota,
    /// UNAVAILABLE: A subsystem is temporarily down.
    Unavailable,
    /// EXPIRED: Credentials or the target have expired.
    Expired,
    /// PRIVACYREQUIRED: The operation needs an encrypted connection.
    PrivacyRequired,
    /// CONTACTADMIN: The user should contact the administrator.
    ContactAdmin,
    /// SERVERBUG: The server hit an internal error.
    ServerBug,
    /// CLIENTBUG: The server thinks the client is misbehaving.
    ClientBug,
    /// INUSE: The target is locked by another session.
    InUse,
    /// Unknown response code.
    Unknown(String),
}

impl ResponseCode {
    /// Parses the first atom inside a bracketed response code, ignoring case.
    ///
    /// Any trailing arguments (e.g. `UIDNEXT 42`) are ignored for
    /// classification but kept verbatim for unknown codes.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
        let atom = trimmed.split_ascii_whitespace().next().unwrap_or_default();
        match atom.to_ascii_uppercase().as_str() {
            "ALERT" => Self::Alert,
            "PARSE" => Self::Parse,
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "TRYCREATE" => Self::TryCreate,
            "ALREADYEXISTS" => Self::AlreadyExists,
            "AUTHENTICATIONFAILED" => Self::AuthenticationFailed,
            "AUTHORIZATIONFAILED" => Self::AuthorizationFailed,
            "CANNOT" => Self::Cannot,
            "LIMIT" => Self::Limit,
            "NOPERM" => Self::NoPerm,
            "NONEXISTENT" => Self::NonExistent,
            "OVERQUOTA" => Self::OverQuota,
            "UNAVAILABLE" => Self::Unavailable,
            "EXPIRED" => Self::Expired,
            "PRIVACYREQUIRED" => Self::PrivacyRequired,
            "CONTACTADMIN" => Self::ContactAdmin,
            "SERVERBUG" => Self::ServerBug,
            "CLIENTBUG" => Self::ClientBug,
            "INUSE" => Self::InUse,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }

    /// Returns the wire atom for this code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::Parse => "PARSE",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::AlreadyExists => "ALREADYEXISTS",
            Self::AuthenticationFailed => "AUTHENTICATIONFAILED",
            Self::AuthorizationFailed => "AUTHORIZATIONFAILED",
            Self::Cannot => "CANNOT",
            Self::Limit => "LIMIT",
            Self::NoPerm => "NOPERM",
            Self::NonExistent => "NONEXISTENT",
            Self::OverQuota => "OVERQUOTA",
            Self::Unavailable => "UNAVAILABLE",
            Self::Expired => "EXPIRED",
            Self::PrivacyRequired => "PRIVACYREQUIRED",
            Self::ContactAdmin => "CONTACTADMIN",
            Self::ServerBug => "SERVERBUG",
            Self::ClientBug => "CLIENTBUG",
            Self::InUse => "INUSE",
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.as_str())
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

    #[test]
    fn parse_classified_codes() {
        assert_eq!(
            ResponseCode::parse("AUTHENTICATIONFAILED"),
            ResponseCode::AuthenticationFailed
        );
        assert_eq!(ResponseCode::parse("[overquota]"), ResponseCode::OverQuota);
        assert_eq!(ResponseCode::parse("NoPerm"), ResponseCode::NoPerm);
        assert_eq!(ResponseCode::parse("READ-ONLY"), ResponseCode::ReadOnly);
    }

    #[test]
    fn parse_ignores_code_arguments() {
        assert_eq!(ResponseCode::parse("ALERT extra text"), ResponseCode::Alert);
    }

    #[test]
    fn unknown_keeps_text() {
        let code = ResponseCode::parse("UIDNEXT 42");
        assert_eq!(code, ResponseCode::Unknown("UIDNEXT 42".to_string()));
        assert_eq!(code.to_string(), "[UIDNEXT 42]");
    }

    #[test]
    fn display_round_trips_known_atoms() {
        for code in [
            ResponseCode::AlreadyExists,
            ResponseCode::Cannot,
            ResponseCode::Limit,
            ResponseCode::Unavailable,
        ] {
            assert_eq!(ResponseCode::parse(code.as_str()), code);
        }
    }
}
