//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses. The session draws
//! them in issuance order and hands them to [`Command::assign_tag`](super::Command::assign_tag).

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::CommandConfig;
use crate::types::Tag;

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format "A0000", "A0001", etc.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Creates a tag generator using the configured prefix.
    #[must_use]
    pub const fn from_config(config: &CommandConfig) -> Self {
        Self::new(config.tag_prefix)
    }

    /// Generates the next tag.
    ///
    /// # Panics
    ///
    /// Panics if the tag counter would overflow `u32::MAX`. In practice, this
    /// would require 4+ billion tags in a single session.
    #[must_use]
    pub fn next(&self) -> Tag {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        assert!(
            n != u32::MAX,
            "tag counter overflow: generated {n} tags in this session"
        );
        Tag::new(format!("{}{:04}", self.prefix, n))
    }

    /// Returns the current counter value without incrementing.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::from_config(&CommandConfig::default())
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
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next(), Tag::new("A0000"));
        assert_eq!(generator.next(), Tag::new("A0001"));
        assert_eq!(generator.current(), 2);
    }

    #[test]
    fn test_prefix_from_config() {
        let config = CommandConfig::builder().tag_prefix('t').build();
        let generator = TagGenerator::from_config(&config);
        assert_eq!(generator.next(), Tag::new("t0000"));
    }

    #[test]
    fn test_issuance_order() {
        let generator = TagGenerator::default();
        let tags: Vec<Tag> = (0..10_050).map(|_| generator.next()).collect();
        assert_eq!(tags[10_000], Tag::new("A10000"));
        assert!(tags.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    #[should_panic(expected = "tag counter overflow")]
    fn test_overflow_detection() {
        let generator = TagGenerator::default();
        generator.counter.store(u32::MAX, Ordering::Relaxed);
        let _ = generator.next();
    }
}
