//! Factory configuration.

use crate::scheduler::Ticks;

/// Configuration for a [`crate::Factory`].
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Ticks a delete request waits on open connections before it reports
    /// "blocked".
    pub delete_blocked_after: Ticks,

    /// Ticks an upgrading open request waits on open connections before it
    /// reports "blocked".
    pub upgrade_blocked_after: Ticks,

    /// Version used when `open` is called without one.
    pub default_version: u64,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            delete_blocked_after: 500,
            upgrade_blocked_after: 1000,
            default_version: 1,
        }
    }
}

impl FactoryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the blocked delay for delete requests.
    #[must_use]
    pub const fn delete_blocked_after(mut self, ticks: Ticks) -> Self {
        self.delete_blocked_after = ticks;
        self
    }

    /// Sets the blocked delay for upgrading open requests.
    #[must_use]
    pub const fn upgrade_blocked_after(mut self, ticks: Ticks) -> Self {
        self.upgrade_blocked_after = ticks;
        self
    }

    /// Sets the version used when `open` is called without one.
    ///
    /// Values below 1 are clamped to 1.
    #[must_use]
    pub const fn default_version(mut self, version: u64) -> Self {
        self.default_version = if version == 0 { 1 } else { version };
        self
    }
}
