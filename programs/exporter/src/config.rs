//! JSON configuration for the exporter binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;

use tek_export_core::model::ExportConfig;
use tek_export_engine::settings::ExporterSettings;

/// Top-level configuration for the exporter process.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExporterConfig {
    /// Shared export tuning knobs.
    #[serde(default)]
    pub exporter: ExporterSettings,
    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Root directory of the filesystem blob store.
    pub blobstore_root: PathBuf,
    /// Path to the raw P-256 signing key.
    pub signing_key_path: PathBuf,
    /// Seconds between export ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Export configurations served by this process.
    pub configs: Vec<ExportConfig>,
    /// Optional JSON seed file of exposures (base64 keys) for local runs;
    /// production deployments read exposures from their own store instead.
    #[serde(default)]
    pub exposures_path: Option<PathBuf>,
}

impl ExporterConfig {
    /// Reads config from a JSON file and validates it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse JSON configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the parsed config.
    pub fn validate(&self) -> Result<()> {
        self.exporter.validate()?;
        ensure!(self.tick_interval_secs > 0, "tick_interval_secs must be positive");
        ensure!(!self.configs.is_empty(), "at least one export config is required");
        for config in &self.configs {
            config.validate()?;
        }
        Ok(())
    }
}

const fn default_tick_interval_secs() -> u64 {
    300
}

/// Observability settings; only the log level is configurable, the log
/// backend is the process's stdout.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// The log level to use.
    pub level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Returns the log level as a `tracing::Level`.
    #[must_use]
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config_json() -> serde_json::Value {
        serde_json::json!({
            "blobstore_root": "/var/lib/exporter/blobs",
            "signing_key_path": "/var/lib/exporter/keys/p256",
            "configs": [{
                "id": "cfg-at",
                "region": "AT",
                "bucket_name": "exposures",
                "filename_root": "AT",
                "period_of_big_file_days": 14,
                "period_of_medium_file_days": 7,
                "period_of_daily_files_days": 3,
                "period_red_warnings_days": 14,
                "period_yellow_warnings_days": 7,
                "signature_infos": [{"signing_key_version": "v1", "signing_key_id": "284"}]
            }]
        })
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, minimal_config_json().to_string()).unwrap();

        let config = ExporterConfig::from_file(&path).unwrap();
        assert_eq!(config.tick_interval_secs, 300);
        assert_eq!(config.exporter.max_records, 100_000);
        assert_eq!(config.observability.level(), Level::INFO);
        assert_eq!(config.configs[0].region, "AT");
        assert!(config.exposures_path.is_none());
    }

    #[test]
    fn invalid_member_configs_are_rejected() {
        let mut json = minimal_config_json();
        json["configs"][0]["bucket_name"] = serde_json::json!("");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, json.to_string()).unwrap();

        assert!(ExporterConfig::from_file(&path).is_err());
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        let config = ObservabilityConfig {
            level: "chatty".to_string(),
        };
        assert_eq!(config.level(), Level::INFO);
    }
}
