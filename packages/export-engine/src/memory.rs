//! In-memory collaborators for tests, local runs, and embedders.

use std::collections::HashMap;

use anyhow::{bail, Result};
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};

use tek_export_core::interval::interval_start;
use tek_export_core::model::{DiagnosisType, Exposure, ExportConfig, ExportFile};

use crate::lock::{LockError, LockService};
use crate::repository::{ExportConfigRepository, ExportFileRepository, ExposureRepository};
use crate::store::Blobstore;

/// Exposure reader over a seeded in-memory pool.
///
/// The publish timestamp of a seeded exposure is taken to be the start of
/// its rolling interval; real deployments filter on their ingestion
/// timestamp instead.
#[derive(Debug, Default)]
pub struct MemoryExposureRepository {
    exposures: RwLock<Vec<Exposure>>,
}

impl MemoryExposureRepository {
    /// Creates a reader seeded with `exposures`.
    #[must_use]
    pub fn new(exposures: Vec<Exposure>) -> Self {
        Self {
            exposures: RwLock::new(exposures),
        }
    }
}

#[async_trait::async_trait]
impl ExposureRepository for MemoryExposureRepository {
    async fn find_for_export(
        &self,
        from: OffsetDateTime,
        until: OffsetDateTime,
        diagnosis_type: DiagnosisType,
        region: &str,
    ) -> Result<Vec<Exposure>> {
        Ok(self
            .exposures
            .read()
            .await
            .iter()
            .filter(|exposure| {
                exposure.region == region && exposure.diagnosis_type == diagnosis_type
            })
            .filter(|exposure| {
                let published_at = interval_start(exposure.interval_number);
                published_at >= from && published_at < until
            })
            .cloned()
            .collect())
    }
}

/// Config repository treating every stored config as always due.
///
/// Crontab-style schedules are a persistence concern; real repositories
/// evaluate them inside `find_due`.
#[derive(Debug, Default)]
pub struct MemoryExportConfigRepository {
    configs: RwLock<Vec<ExportConfig>>,
}

impl MemoryExportConfigRepository {
    /// Creates a repository seeded with `configs`.
    #[must_use]
    pub fn new(configs: Vec<ExportConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }
}

#[async_trait::async_trait]
impl ExportConfigRepository for MemoryExportConfigRepository {
    async fn find_due(&self, _now: OffsetDateTime) -> Result<Vec<ExportConfig>> {
        Ok(self.configs.read().await.clone())
    }
}

/// Append-only in-memory export-file ledger.
#[derive(Debug, Default)]
pub struct MemoryExportFileRepository {
    rows: RwLock<Vec<ExportFile>>,
}

impl MemoryExportFileRepository {
    /// Snapshot of every recorded row, in insertion order.
    pub async fn all(&self) -> Vec<ExportFile> {
        self.rows.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ExportFileRepository for MemoryExportFileRepository {
    async fn save(&self, file: ExportFile) -> Result<()> {
        self.rows.write().await.push(file);
        Ok(())
    }
}

/// Blob store keeping objects in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryBlobstore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobstore {
    /// Snapshot of an object, if present.
    pub async fn get(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Names of every object in `bucket`, unordered.
    pub async fn object_names(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Blobstore for MemoryBlobstore {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), name.to_string()), bytes);
        Ok(())
    }

    async fn copy(&self, bucket: &str, src: &str, dst: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        let Some(bytes) = objects.get(&(bucket.to_string(), src.to_string())).cloned() else {
            bail!("source object {bucket}/{src} does not exist");
        };
        objects.insert((bucket.to_string(), dst.to_string()), bytes);
        Ok(())
    }
}

/// Single-process lease table with the same fencing semantics as a
/// database-backed lock.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    leases: Mutex<HashMap<String, OffsetDateTime>>,
}

#[async_trait::async_trait]
impl LockService for MemoryLockService {
    async fn acquire(&self, lock_id: &str, ttl: Duration) -> Result<OffsetDateTime, LockError> {
        let now = OffsetDateTime::now_utc();
        let mut leases = self.leases.lock().await;
        if let Some(expiry) = leases.get(lock_id) {
            if *expiry > now {
                return Err(LockError::NotAcquired);
            }
        }
        let release_at = now + ttl;
        leases.insert(lock_id.to_string(), release_at);
        Ok(release_at)
    }

    async fn release(&self, lock_id: &str, token: OffsetDateTime) -> Result<bool, LockError> {
        let mut leases = self.leases.lock().await;
        match leases.get(lock_id) {
            Some(expiry) if *expiry == token => {
                leases.remove(lock_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
