//! Live sync configuration
//!
//! Loaded from TOML; every field is optional and falls back to its default:
//!
//! ```toml
//! poll_interval_ms = 5000
//! save_debounce_ms = 500
//! clear_debounce_ms = 3000
//! collapse_statuses = ["pass"]
//! ```

use crate::error::LiveError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tally_model::TestStatus;

/// Timing and behaviour of a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Interval between polls
    pub poll_interval_ms: u64,
    /// Quiet time after the last edit before it is saved
    pub save_debounce_ms: u64,
    /// Quiet time after a successful save before the overlay entry is dropped
    pub clear_debounce_ms: u64,
    /// Statuses that collapse an expanded test case when a result enters them
    pub collapse_statuses: Vec<TestStatus>,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = millis(interval);
        self
    }

    /// With save debounce
    #[inline]
    #[must_use]
    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce_ms = millis(debounce);
        self
    }

    /// With clear debounce
    #[inline]
    #[must_use]
    pub fn with_clear_debounce(mut self, debounce: Duration) -> Self {
        self.clear_debounce_ms = millis(debounce);
        self
    }

    /// With collapse statuses
    #[inline]
    #[must_use]
    pub fn with_collapse_statuses(mut self, statuses: Vec<TestStatus>) -> Self {
        self.collapse_statuses = statuses;
        self
    }

    /// Poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Save debounce
    #[inline]
    #[must_use]
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Clear debounce
    #[inline]
    #[must_use]
    pub fn clear_debounce(&self) -> Duration {
        Duration::from_millis(self.clear_debounce_ms)
    }

    /// Check the timing constraints
    ///
    /// # Errors
    /// `LiveError::Config` if an interval is zero or the clear debounce does
    /// not exceed the save debounce
    pub fn validate(&self) -> Result<(), LiveError> {
        if self.poll_interval_ms == 0 {
            return Err(LiveError::Config("poll_interval_ms must be non-zero".into()));
        }
        if self.save_debounce_ms == 0 {
            return Err(LiveError::Config("save_debounce_ms must be non-zero".into()));
        }
        if self.clear_debounce_ms <= self.save_debounce_ms {
            return Err(LiveError::Config(format!(
                "clear_debounce_ms ({}) must exceed save_debounce_ms ({})",
                self.clear_debounce_ms, self.save_debounce_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// `LiveError::Config` on malformed TOML, unknown keys or invalid values
    pub fn from_toml_str(content: &str) -> Result<Self, LiveError> {
        let config: Self =
            toml::from_str(content).map_err(|e| LiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `LiveError::Config` if the file cannot be read or is invalid
    pub fn load(path: &Path) -> Result<Self, LiveError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LiveError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            save_debounce_ms: 500,
            clear_debounce_ms: 3_000,
            collapse_statuses: vec![TestStatus::Pass],
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
