//! The export pipeline: lock-guarded tick, per-config windowing and
//! batching, signing, upload, and index publication.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};

use tek_export_core::archive::ExportBatch;
use tek_export_core::interval::{interval_number_at, start_of_utc_day};
use tek_export_core::model::{
    DiagnosisType, Exposure, ExportConfig, ExportFile, ExportFileStatus, SignatureInfo,
};
use tek_export_core::padding::extend_with_padding;

use crate::error::ExportError;
use crate::index::{BatchIndex, IndexFile};
use crate::lock::{LockError, LockService};
use crate::repository::{ExportConfigRepository, ExportFileRepository, ExposureRepository};
use crate::settings::ExporterSettings;
use crate::signer::Signer;
use crate::store::Blobstore;

/// Name of the lease serialising export ticks across workers.
pub const EXPORT_LOCK_ID: &str = "export_files";

/// Object prefix of daily batches; big and medium batches use
/// `batch_full{days}`.
const DAILY_PREFIX: &str = "batch";

/// One export worker node.
///
/// A worker runs complete export ticks: it takes the shared lease,
/// processes every due config sequentially, and releases the lease. Peers
/// on other nodes are safe to tick concurrently; the lease admits one.
pub struct ExportWorker {
    settings: ExporterSettings,
    exposures: Arc<dyn ExposureRepository>,
    configs: Arc<dyn ExportConfigRepository>,
    export_files: Arc<dyn ExportFileRepository>,
    blobstore: Arc<dyn Blobstore>,
    signer: Arc<dyn Signer>,
    lock: Arc<dyn LockService>,
}

impl ExportWorker {
    /// Creates a worker over the given collaborators.
    #[must_use]
    pub fn new(
        settings: ExporterSettings,
        exposures: Arc<dyn ExposureRepository>,
        configs: Arc<dyn ExportConfigRepository>,
        export_files: Arc<dyn ExportFileRepository>,
        blobstore: Arc<dyn Blobstore>,
        signer: Arc<dyn Signer>,
        lock: Arc<dyn LockService>,
    ) -> Self {
        Self {
            settings,
            exposures,
            configs,
            export_files,
            blobstore,
            signer,
            lock,
        }
    }

    /// Runs one export tick at logical time `now`.
    ///
    /// Takes the shared export lease first; if a peer holds it the tick is
    /// a clean no-op. The lease is released on success and failure alike,
    /// with its expiry as the fencing token.
    ///
    /// # Errors
    /// Returns an error when a repository, the blob store, the signer, or
    /// batch serialisation fails. Lock contention is not an error.
    #[instrument(skip_all)]
    pub async fn export(&self, now: OffsetDateTime) -> Result<(), ExportError> {
        let token = match self
            .lock
            .acquire(EXPORT_LOCK_ID, self.settings.create_timeout())
            .await
        {
            Ok(token) => token,
            Err(LockError::NotAcquired) => {
                info!("export lease held by a peer, skipping tick");
                return Ok(());
            }
            Err(LockError::Backend(message)) => return Err(ExportError::Lock(message)),
        };

        let outcome = self.run_tick(now).await;

        match self.lock.release(EXPORT_LOCK_ID, token).await {
            Ok(true) => info!("export lease released"),
            Ok(false) => {
                warn!("export lease token mismatch on release; lease may have expired mid-tick");
            }
            Err(err) => warn!(error = %err, "failed to release export lease"),
        }

        outcome
    }

    async fn run_tick(&self, now: OffsetDateTime) -> Result<(), ExportError> {
        let due = self
            .configs
            .find_due(now)
            .await
            .map_err(ExportError::Repository)?;
        info!(configs = due.len(), "export tick started");

        for config in due {
            match self.export_config(&config, now).await {
                Ok(()) => {}
                Err(err @ ExportError::Config(_)) => {
                    // Misconfiguration is scoped to its config; later
                    // configs still run this tick.
                    error!(config = %config.id, error = %err, "skipping unusable export config");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(config = %config.id, region = %config.region))]
    async fn export_config(
        &self,
        config: &ExportConfig,
        now: OffsetDateTime,
    ) -> Result<(), ExportError> {
        config.validate()?;

        let start_of_today = start_of_utc_day(now);
        let until = if self.settings.export_current_day {
            now
        } else {
            start_of_today
        };

        let pool = self.assemble_pool(config, start_of_today, until).await?;
        info!(exposures = pool.len(), "assembled exposure pool");

        let end_interval = interval_number_at(until);

        // Big and medium retrospective batches share the recipe and differ
        // only in window length.
        let full_big_batch = self
            .export_window(
                config,
                now,
                start_of_today,
                until,
                end_interval,
                config.period_of_big_file_days,
                &pool,
            )
            .await?;
        let full_medium_batch = self
            .export_window(
                config,
                now,
                start_of_today,
                until,
                end_interval,
                config.period_of_medium_file_days,
                &pool,
            )
            .await?;

        // Daily batches: one calendar-day window each, oldest first.
        let mut daily_batches = Vec::new();
        let mut date = start_of_today - config.period_of_daily_files();
        while date < until {
            let next = date + Duration::days(1);
            let from_interval = interval_number_at(date);
            let day = filter_by_interval(&pool, from_interval, interval_number_at(next));
            let end_ts = if next < now { next } else { now };
            let files = self
                .export_batches(config, DAILY_PREFIX, now, date, end_ts, from_interval, day)
                .await?;
            daily_batches.push(BatchIndex {
                interval_number: i64::from(from_interval),
                files,
            });
            date = next;
        }

        let index = IndexFile {
            full_big_batch,
            full_medium_batch,
            daily_batches,
        };
        self.publish_index(config, now, &index).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn export_window(
        &self,
        config: &ExportConfig,
        now: OffsetDateTime,
        start_of_today: OffsetDateTime,
        until: OffsetDateTime,
        end_interval: i32,
        period_days: i64,
        pool: &[Exposure],
    ) -> Result<BatchIndex, ExportError> {
        let from_interval = interval_number_at(start_of_today - Duration::days(period_days));
        let filtered = filter_by_interval(pool, from_interval, end_interval);
        let prefix = format!("batch_full{period_days}");
        let files = self
            .export_batches(
                config,
                &prefix,
                now,
                start_of_today,
                until,
                from_interval,
                filtered,
            )
            .await?;
        Ok(BatchIndex {
            interval_number: i64::from(from_interval),
            files,
        })
    }

    async fn assemble_pool(
        &self,
        config: &ExportConfig,
        start_of_today: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Vec<Exposure>, ExportError> {
        let mut pool = self
            .exposures
            .find_for_export(
                start_of_today - config.period_red_warnings(),
                until,
                DiagnosisType::RedWarning,
                &config.region,
            )
            .await
            .map_err(ExportError::Repository)?;
        let yellow = self
            .exposures
            .find_for_export(
                start_of_today - config.period_yellow_warnings(),
                until,
                DiagnosisType::YellowWarning,
                &config.region,
            )
            .await
            .map_err(ExportError::Repository)?;
        pool.extend(yellow);
        Ok(pool)
    }

    /// Shards `exposures` into archives of at most `max_records` keys,
    /// pads a short last shard, signs and uploads each, and returns the
    /// published paths in batch order.
    #[allow(clippy::too_many_arguments)]
    async fn export_batches(
        &self,
        config: &ExportConfig,
        prefix: &str,
        file_date: OffsetDateTime,
        start: OffsetDateTime,
        end: OffsetDateTime,
        interval_number: i32,
        mut exposures: Vec<Exposure>,
    ) -> Result<Vec<String>, ExportError> {
        if exposures.is_empty() {
            info!(prefix, "no exposures in window, nothing to upload");
            return Ok(Vec::new());
        }

        exposures.sort_by(|a, b| a.key.cmp(&b.key));
        let mut groups: Vec<Vec<Exposure>> = exposures
            .chunks(self.settings.max_records)
            .map(<[Exposure]>::to_vec)
            .collect();

        if let Some(last) = groups.last_mut() {
            if last.len() < self.settings.min_records {
                extend_with_padding(
                    last,
                    &config.region,
                    self.settings.min_records,
                    self.settings.padding_range,
                )?;
                last.sort_by(|a, b| a.key.cmp(&b.key));
            }
        }

        let active_infos: Vec<SignatureInfo> = config
            .signature_infos
            .iter()
            .filter(|info| info.is_active(file_date))
            .cloned()
            .collect();

        let batch_size = groups.len() as i32;
        let mut paths = Vec::with_capacity(groups.len());
        for (i, group) in groups.iter().enumerate() {
            let batch_num = i as i32 + 1;
            let object_name = format!(
                "{}/{}/{}-{}-{}.zip",
                config.filename_root,
                file_date.unix_timestamp(),
                prefix,
                interval_number,
                batch_num,
            );

            let batch = ExportBatch {
                region: &config.region,
                start_timestamp: start.unix_timestamp(),
                end_timestamp: end.unix_timestamp(),
                batch_num,
                batch_size,
                exposures: group,
                signature_infos: &active_infos,
            };

            let export_bin = batch.export_bin();
            let signature = self
                .signer
                .sign(&export_bin)
                .await
                .map_err(ExportError::Signer)?;
            let archive = batch.archive(&export_bin, &signature)?;

            self.blobstore
                .put(&config.bucket_name, &object_name, archive)
                .await
                .map_err(ExportError::Storage)?;
            self.record_file(config, &object_name, file_date).await?;

            debug!(object = %object_name, keys = group.len(), "uploaded batch archive");
            paths.push(format!("/{}/{}", config.bucket_name, object_name));
        }

        Ok(paths)
    }

    async fn publish_index(
        &self,
        config: &ExportConfig,
        now: OffsetDateTime,
        index: &IndexFile,
    ) -> Result<(), ExportError> {
        let body = serde_json::to_vec(index)?;
        let object_name = format!("{}/{}/index.json", config.filename_root, now.unix_timestamp());
        self.blobstore
            .put(&config.bucket_name, &object_name, body)
            .await
            .map_err(ExportError::Storage)?;
        self.record_file(config, &object_name, now).await?;

        // The stable alias is the last write of the run, so pollers never
        // observe a half-uploaded batch set.
        let alias = format!("{}/index.json", config.filename_root);
        self.blobstore
            .copy(&config.bucket_name, &object_name, &alias)
            .await
            .map_err(ExportError::Storage)?;

        info!(index = %object_name, "published index and refreshed stable alias");
        Ok(())
    }

    async fn record_file(
        &self,
        config: &ExportConfig,
        object_name: &str,
        file_date: OffsetDateTime,
    ) -> Result<(), ExportError> {
        self.export_files
            .save(ExportFile {
                object_name: object_name.to_string(),
                bucket: config.bucket_name.clone(),
                config_id: config.id.clone(),
                region: config.region.clone(),
                file_date: file_date.unix_timestamp(),
                status: ExportFileStatus::Created,
            })
            .await
            .map_err(ExportError::Repository)
    }
}

/// Exposures whose start interval lies in `[from, to)`.
fn filter_by_interval(pool: &[Exposure], from: i32, to: i32) -> Vec<Exposure> {
    pool.iter()
        .filter(|exposure| exposure.interval_number >= from && exposure.interval_number < to)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exposure(interval_number: i32) -> Exposure {
        Exposure {
            key: vec![0x11; 16],
            transmission_risk: 3,
            interval_number,
            interval_count: 144,
            region: "AT".to_string(),
            diagnosis_type: DiagnosisType::RedWarning,
        }
    }

    #[test]
    fn interval_filter_is_half_open() {
        let pool = vec![exposure(10), exposure(20), exposure(29), exposure(30)];
        let filtered = filter_by_interval(&pool, 20, 30);
        let numbers: Vec<i32> = filtered.iter().map(|e| e.interval_number).collect();
        assert_eq!(numbers, vec![20, 29]);
    }
}
