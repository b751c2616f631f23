//! Error taxonomy of the export pipeline.

use thiserror::Error;

use tek_export_core::archive::ArchiveError;
use tek_export_core::model::ConfigError;
use tek_export_core::padding::PaddingError;

/// A failed export tick or config pass.
///
/// Lock contention never surfaces here: a tick that loses the lease is a
/// successful no-op. [`ExportError::Config`] aborts only the config it
/// belongs to; every other variant aborts the whole tick. The core never
/// retries — the next tick is the retry.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The lock backend failed (not mere contention).
    #[error("lock backend failure: {0}")]
    Lock(String),
    /// A blob put or copy failed.
    #[error("blob storage failure: {0}")]
    Storage(anyhow::Error),
    /// The signer refused to produce a signature.
    #[error("signer failure: {0}")]
    Signer(anyhow::Error),
    /// A repository read or write failed.
    #[error("repository failure: {0}")]
    Repository(anyhow::Error),
    /// A batch or index could not be serialised.
    #[error("serialisation failure: {0}")]
    Serialization(String),
    /// Synthetic padding could not be generated.
    #[error("padding failure: {0}")]
    Padding(#[from] PaddingError),
    /// The export configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ArchiveError> for ExportError {
    fn from(err: ArchiveError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
