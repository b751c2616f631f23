//! Persistence seams consumed by the export pipeline.

use anyhow::Result;
use time::OffsetDateTime;

use tek_export_core::model::{DiagnosisType, Exposure, ExportConfig, ExportFile};

/// Read access to published exposures.
#[async_trait::async_trait]
pub trait ExposureRepository: Send + Sync {
    /// Exposures published in `[from, until)` for one region and diagnosis
    /// type. Ordering is unspecified; the pipeline re-sorts before
    /// marshalling.
    async fn find_for_export(
        &self,
        from: OffsetDateTime,
        until: OffsetDateTime,
        diagnosis_type: DiagnosisType,
        region: &str,
    ) -> Result<Vec<Exposure>>;
}

/// Read access to export configurations.
#[async_trait::async_trait]
pub trait ExportConfigRepository: Send + Sync {
    /// Configs whose schedule makes them due at `now`, in run order.
    async fn find_due(&self, now: OffsetDateTime) -> Result<Vec<ExportConfig>>;
}

/// Write access to export-file bookkeeping rows.
#[async_trait::async_trait]
pub trait ExportFileRepository: Send + Sync {
    /// Records one uploaded object.
    async fn save(&self, file: ExportFile) -> Result<()>;
}
