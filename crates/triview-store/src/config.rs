//! Store configuration

use serde::{Deserialize, Serialize};

/// Store tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of version records kept for incremental consumers
    ///
    /// A consumer that falls further behind than this recomputes from
    /// scratch.
    pub changelog_capacity: usize,
}

impl StoreConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With change log capacity
    #[inline]
    #[must_use]
    pub fn with_changelog_capacity(mut self, capacity: usize) -> Self {
        self.changelog_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            changelog_capacity: 256,
        }
    }
}
