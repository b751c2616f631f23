//! Process-wide exporter settings.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;

/// Tuning knobs shared by every export config in the process.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterSettings {
    /// Maximum number of keys per archive; larger windows are sharded.
    pub max_records: usize,
    /// Minimum number of keys in a published archive, before jitter.
    pub min_records: usize,
    /// Exclusive upper bound of the random padding jitter.
    pub padding_range: usize,
    /// Export-lease TTL in seconds; the soft time budget of one tick.
    pub create_timeout_secs: i64,
    /// Export the running day up to `now` instead of stopping at UTC
    /// midnight.
    pub export_current_day: bool,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            max_records: 100_000,
            min_records: 140,
            padding_range: 100,
            create_timeout_secs: 300,
            export_current_day: false,
        }
    }
}

impl ExporterSettings {
    /// Validates the settings before a worker is built around them.
    ///
    /// # Errors
    /// Returns the first rejected field.
    pub const fn validate(&self) -> Result<(), SettingsError> {
        if self.max_records < 1 {
            return Err(SettingsError::MaxRecords);
        }
        if self.min_records < 1 {
            return Err(SettingsError::MinRecords);
        }
        if self.create_timeout_secs < 1 {
            return Err(SettingsError::CreateTimeout);
        }
        Ok(())
    }

    /// Export-lease TTL as a duration.
    #[must_use]
    pub const fn create_timeout(&self) -> Duration {
        Duration::seconds(self.create_timeout_secs)
    }
}

/// Rejected exporter settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// `max_records` must be at least 1.
    #[error("max_records must be at least 1")]
    MaxRecords,
    /// `min_records` must be at least 1.
    #[error("min_records must be at least 1")]
    MinRecords,
    /// `create_timeout_secs` must be at least 1.
    #[error("create_timeout_secs must be at least 1")]
    CreateTimeout,
}
