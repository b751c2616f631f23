//! Domain model shared by the export pipeline and its collaborators.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Raw length of a temporary exposure key, in bytes.
pub const KEY_LENGTH: usize = 16;

/// Maximum number of rolling intervals a key may be valid for (one day).
pub const MAX_INTERVAL_COUNT: i32 = 144;

/// Diagnosis classification attached to a submitted exposure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosisType {
    /// Laboratory-confirmed case.
    RedWarning,
    /// Suspected case.
    YellowWarning,
    /// All-clear revocation.
    GreenWarning,
}

impl DiagnosisType {
    /// Wire name of the diagnosis type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RedWarning => "red-warning",
            Self::YellowWarning => "yellow-warning",
            Self::GreenWarning => "green-warning",
        }
    }
}

impl std::fmt::Display for DiagnosisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published temporary exposure key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    /// Raw 16-byte key; base64 in JSON, raw when marshalled.
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    /// Relative transmission risk reported on submission.
    pub transmission_risk: i32,
    /// Rolling interval at which the key became active.
    pub interval_number: i32,
    /// Number of intervals the key stays valid, at most [`MAX_INTERVAL_COUNT`].
    pub interval_count: i32,
    /// Region that published the key.
    pub region: String,
    /// Diagnosis classification of the submission.
    pub diagnosis_type: DiagnosisType,
}

impl Exposure {
    /// Checks the stored-exposure invariants.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ExposureError> {
        if self.key.len() != KEY_LENGTH {
            return Err(ExposureError::KeyLength(self.key.len()));
        }
        if self.interval_count < 1 || self.interval_count > MAX_INTERVAL_COUNT {
            return Err(ExposureError::IntervalCount(self.interval_count));
        }
        if self.interval_number < 0 {
            return Err(ExposureError::IntervalNumber(self.interval_number));
        }
        Ok(())
    }
}

/// Violated stored-exposure invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExposureError {
    /// The raw key is not exactly 16 bytes.
    #[error("exposure key must be 16 bytes, got {0}")]
    KeyLength(usize),
    /// The rolling period is outside `[1, 144]`.
    #[error("interval count {0} outside [1, 144]")]
    IntervalCount(i32),
    /// The start interval is negative.
    #[error("interval number {0} is negative")]
    IntervalNumber(i32),
}

/// Identity under which export batches are signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Version string surfaced verbatim in the archive, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key_version: Option<String>,
    /// Key identifier surfaced verbatim in the archive, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key_id: Option<String>,
    /// Expiry of the identity, seconds since the Unix epoch in JSON.
    /// Expired identities are dropped at export time.
    #[serde(
        default,
        with = "time::serde::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_timestamp: Option<OffsetDateTime>,
}

impl SignatureInfo {
    /// Whether the identity may still sign at `now`.
    #[must_use]
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.end_timestamp.map_or(true, |end| end >= now)
    }
}

/// Scheduling unit: one region's export parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Stable identifier, referenced from [`ExportFile`] rows.
    pub id: String,
    /// Region whose exposures this config exports.
    pub region: String,
    /// Blob-store bucket the archives land in.
    pub bucket_name: String,
    /// Leading path segment of every object this config writes.
    pub filename_root: String,
    /// Retrospective window of the large batch, in days.
    pub period_of_big_file_days: i64,
    /// Retrospective window of the medium batch, in days.
    pub period_of_medium_file_days: i64,
    /// Number of trailing daily batches.
    pub period_of_daily_files_days: i64,
    /// Pool-eligibility window for red warnings, in days.
    pub period_red_warnings_days: i64,
    /// Pool-eligibility window for yellow warnings, in days.
    pub period_yellow_warnings_days: i64,
    /// Signing identities active for this config.
    pub signature_infos: Vec<SignatureInfo>,
}

impl ExportConfig {
    /// Retrospective window of the large batch.
    #[must_use]
    pub const fn period_of_big_file(&self) -> Duration {
        Duration::days(self.period_of_big_file_days)
    }

    /// Retrospective window of the medium batch.
    #[must_use]
    pub const fn period_of_medium_file(&self) -> Duration {
        Duration::days(self.period_of_medium_file_days)
    }

    /// Span of the daily batch series.
    #[must_use]
    pub const fn period_of_daily_files(&self) -> Duration {
        Duration::days(self.period_of_daily_files_days)
    }

    /// Pool-eligibility window for red warnings.
    #[must_use]
    pub const fn period_red_warnings(&self) -> Duration {
        Duration::days(self.period_red_warnings_days)
    }

    /// Pool-eligibility window for yellow warnings.
    #[must_use]
    pub const fn period_yellow_warnings(&self) -> Duration {
        Duration::days(self.period_yellow_warnings_days)
    }

    /// Validates the config before an export pass uses it.
    ///
    /// # Errors
    /// Returns the first rejected field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.is_empty() {
            return Err(ConfigError::MissingRegion(self.id.clone()));
        }
        if self.bucket_name.is_empty() {
            return Err(ConfigError::MissingBucket(self.id.clone()));
        }
        if self.filename_root.is_empty() {
            return Err(ConfigError::MissingFilenameRoot(self.id.clone()));
        }
        for (name, days) in [
            ("period_of_big_file_days", self.period_of_big_file_days),
            ("period_of_medium_file_days", self.period_of_medium_file_days),
            ("period_of_daily_files_days", self.period_of_daily_files_days),
            ("period_red_warnings_days", self.period_red_warnings_days),
            ("period_yellow_warnings_days", self.period_yellow_warnings_days),
        ] {
            if days < 1 {
                return Err(ConfigError::NonPositivePeriod {
                    id: self.id.clone(),
                    name,
                    days,
                });
            }
        }
        Ok(())
    }
}

/// Rejected export configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The region identifier is empty.
    #[error("export config {0}: region is empty")]
    MissingRegion(String),
    /// The bucket name is empty.
    #[error("export config {0}: bucket name is empty")]
    MissingBucket(String),
    /// The filename root is empty.
    #[error("export config {0}: filename root is empty")]
    MissingFilenameRoot(String),
    /// A retrospective period is zero or negative.
    #[error("export config {id}: {name} must be positive, got {days}")]
    NonPositivePeriod {
        /// Identifier of the rejected config.
        id: String,
        /// Name of the offending field.
        name: &'static str,
        /// The rejected value.
        days: i64,
    },
}

/// Lifecycle state of an uploaded export object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFileStatus {
    /// Uploaded by the export pipeline; later transitions are owned by
    /// retention cleanup.
    #[serde(rename = "EXPORT_FILE_CREATED")]
    Created,
}

/// Bookkeeping row recorded for every uploaded object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFile {
    /// Object key inside the bucket.
    pub object_name: String,
    /// Bucket the object was written to.
    pub bucket: String,
    /// Identifier of the owning [`ExportConfig`].
    pub config_id: String,
    /// Region of the owning config.
    pub region: String,
    /// Run timestamp, seconds since the Unix epoch.
    pub file_date: i64,
    /// Lifecycle state.
    pub status: ExportFileStatus,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn exposure() -> Exposure {
        Exposure {
            key: vec![0xAB; KEY_LENGTH],
            transmission_risk: 3,
            interval_number: 2_677_824,
            interval_count: 144,
            region: "AT".to_string(),
            diagnosis_type: DiagnosisType::RedWarning,
        }
    }

    fn config() -> ExportConfig {
        ExportConfig {
            id: "cfg-at".to_string(),
            region: "AT".to_string(),
            bucket_name: "exposures".to_string(),
            filename_root: "AT".to_string(),
            period_of_big_file_days: 14,
            period_of_medium_file_days: 7,
            period_of_daily_files_days: 3,
            period_red_warnings_days: 14,
            period_yellow_warnings_days: 7,
            signature_infos: vec![],
        }
    }

    #[test]
    fn diagnosis_types_use_kebab_wire_names() {
        assert_eq!(
            serde_json::to_string(&DiagnosisType::RedWarning).unwrap(),
            "\"red-warning\""
        );
        let parsed: DiagnosisType = serde_json::from_str("\"yellow-warning\"").unwrap();
        assert_eq!(parsed, DiagnosisType::YellowWarning);
        assert_eq!(DiagnosisType::GreenWarning.as_str(), "green-warning");
    }

    #[test]
    fn exposure_keys_round_trip_as_base64() {
        let exposure = exposure();
        let json = serde_json::to_string(&exposure).unwrap();
        assert!(json.contains("q6urq6urq6urq6urq6urqw=="));
        let parsed: Exposure = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, exposure);
    }

    #[test]
    fn exposure_invariants_are_enforced() {
        assert_eq!(exposure().validate(), Ok(()));

        let mut short_key = exposure();
        short_key.key.truncate(8);
        assert_eq!(short_key.validate(), Err(ExposureError::KeyLength(8)));

        let mut long_period = exposure();
        long_period.interval_count = 145;
        assert_eq!(
            long_period.validate(),
            Err(ExposureError::IntervalCount(145))
        );

        let mut negative = exposure();
        negative.interval_number = -1;
        assert_eq!(negative.validate(), Err(ExposureError::IntervalNumber(-1)));
    }

    #[test]
    fn signature_info_expires_at_its_end_timestamp() {
        let now = datetime!(2020-12-01 12:00 UTC);
        let open_ended = SignatureInfo {
            signing_key_version: None,
            signing_key_id: None,
            end_timestamp: None,
        };
        assert!(open_ended.is_active(now));

        let expiring = SignatureInfo {
            end_timestamp: Some(now),
            ..open_ended.clone()
        };
        assert!(expiring.is_active(now));

        let expired = SignatureInfo {
            end_timestamp: Some(now - Duration::hours(1)),
            ..open_ended
        };
        assert!(!expired.is_active(now));
    }

    #[test]
    fn config_validation_rejects_missing_fields() {
        assert_eq!(config().validate(), Ok(()));

        let mut no_bucket = config();
        no_bucket.bucket_name.clear();
        assert_eq!(
            no_bucket.validate(),
            Err(ConfigError::MissingBucket("cfg-at".to_string()))
        );

        let mut no_root = config();
        no_root.filename_root.clear();
        assert!(matches!(
            no_root.validate(),
            Err(ConfigError::MissingFilenameRoot(_))
        ));

        let mut zero_period = config();
        zero_period.period_of_daily_files_days = 0;
        assert!(matches!(
            zero_period.validate(),
            Err(ConfigError::NonPositivePeriod {
                name: "period_of_daily_files_days",
                days: 0,
                ..
            })
        ));
    }

    #[test]
    fn export_file_status_uses_the_stored_wire_name() {
        assert_eq!(
            serde_json::to_string(&ExportFileStatus::Created).unwrap(),
            "\"EXPORT_FILE_CREATED\""
        );
    }
}
