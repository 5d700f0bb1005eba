//! Command configuration types.

use std::time::Duration;

/// Default per-command response timeout.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default tag prefix.
pub const DEFAULT_TAG_PREFIX: char = 'A';

/// Settings applied to commands as they are built and tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    /// How long a command may go without any server traffic.
    pub response_timeout: Duration,
    /// Prefix used when generating tags.
    pub tag_prefix: char,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            tag_prefix: DEFAULT_TAG_PREFIX,
        }
    }
}

impl CommandConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> CommandConfigBuilder {
        CommandConfigBuilder::new()
    }
}

/// Builder for command configuration.
#[derive(Debug, Clone)]
pub struct CommandConfigBuilder {
    response_timeout: Duration,
    tag_prefix: char,
}

impl Default for CommandConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            tag_prefix: DEFAULT_TAG_PREFIX,
        }
    }

    /// Sets the response timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the tag prefix.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.tag_prefix = prefix;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub const fn build(self) -> CommandConfig {
        CommandConfig {
            response_timeout: self.response_timeout,
            tag_prefix: self.tag_prefix,
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
    fn test_defaults() {
        let config = CommandConfig::new();
        assert_eq!(config.response_timeout, Duration::from_secs(30));
        assert_eq!(config.tag_prefix, 'A');
    }

    #[test]
    fn test_builder() {
        let config = CommandConfig::builder()
            .response_timeout(Duration::from_secs(60))
            .tag_prefix('t')
            .build();

        assert_eq!(config.response_timeout, Duration::from_secs(60));
        assert_eq!(config.tag_prefix, 't');
    }
}
