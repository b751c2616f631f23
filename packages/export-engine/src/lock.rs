//! Cross-worker lease guarding the export tick.

use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Named short-lived lease shared by export workers.
///
/// `acquire` hands back the lease expiry, which doubles as the fencing
/// token for `release`.
#[async_trait::async_trait]
pub trait LockService: Send + Sync {
    /// Takes the lease `lock_id` for `ttl`.
    ///
    /// # Errors
    /// Fails with [`LockError::NotAcquired`] while another worker holds a
    /// live lease, or [`LockError::Backend`] when the lease store itself
    /// fails.
    async fn acquire(&self, lock_id: &str, ttl: Duration) -> Result<OffsetDateTime, LockError>;

    /// Releases `lock_id`. Returns `true` iff the stored expiry still
    /// equals `token`.
    ///
    /// # Errors
    /// Fails only when the lease store itself fails.
    async fn release(&self, lock_id: &str, token: OffsetDateTime) -> Result<bool, LockError>;
}

/// Lease acquisition or backend failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    /// Another worker holds a live lease.
    #[error("lock is held by another worker")]
    NotAcquired,
    /// The lease store itself failed.
    #[error("lock backend failure: {0}")]
    Backend(String),
}
