//! Command tags.

use std::cmp::Ordering;

/// IMAP command tag.
///
/// Tags are alphanumeric prefixes that identify commands and their responses.
/// A command starts out with an unassigned tag; the session assigns a real
/// one exactly once, and the server echoes it back in the tagged completion.
///
/// Unassigned sorts first. Assigned tags compare by length, then lexically,
/// so generated tags sort in issuance order past their zero padding
/// (`A9999 < A10000`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Tag {
    /// No tag assigned yet.
    #[default]
    Unassigned,
    /// Tag assigned by the session.
    Assigned(String),
}

impl Tag {
    /// Creates an assigned tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self::Assigned(tag.into())
    }

    /// Returns `true` if this tag holds a value.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    /// Returns the tag as a string slice, if assigned.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(tag) => Some(tag),
        }
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Unassigned, Self::Unassigned) => Ordering::Equal,
            (Self::Unassigned, Self::Assigned(_)) => Ordering::Less,
            (Self::Assigned(_), Self::Unassigned) => Ordering::Greater,
            (Self::Assigned(a), Self::Assigned(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
        }
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => f.write_str("----"),
            Self::Assigned(tag) => f.write_str(tag),
        }
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
    fn default_is_unassigned() {
        let tag = Tag::default();
        assert!(!tag.is_assigned());
        assert_eq!(tag.as_str(), None);
        assert_eq!(tag.to_string(), "----");
    }

    #[test]
    fn assigned_tag() {
        let tag = Tag::new("t001");
        assert!(tag.is_assigned());
        assert_eq!(tag.as_str(), Some("t001"));
        assert_eq!(tag.to_string(), "t001");
    }

    #[test]
    fn ordering_follows_issuance() {
        assert!(Tag::new("A0001") < Tag::new("A0002"));
        assert!(Tag::Unassigned < Tag::new("A0000"));
        assert!(Tag::new("A9999") < Tag::new("A10000"));
        assert!(Tag::new("A99999") < Tag::new("A100000"));
        assert_eq!(Tag::new("A0042").cmp(&Tag::new("A0042")), Ordering::Equal);
    }
}
