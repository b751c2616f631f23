//! Blob storage seam and the filesystem reference backend.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Immutable-object store the archives and indexes are published to.
///
/// The pipeline only ever writes: archives and timestamped indexes exactly
/// once, the stable index alias by atomic replacement.
#[async_trait::async_trait]
pub trait Blobstore: Send + Sync {
    /// Writes `bytes` at `name` inside `bucket`, overwriting any previous
    /// object.
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Atomically replaces `dst` with a copy of `src` inside `bucket`.
    async fn copy(&self, bucket: &str, src: &str, dst: &str) -> Result<()>;
}

/// Blob store backed by a local directory; objects live at
/// `{root}/{bucket}/{name}`.
#[derive(Clone, Debug)]
pub struct FsBlobstore {
    root: PathBuf,
}

impl FsBlobstore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, name: &str) -> PathBuf {
        self.root.join(bucket).join(name)
    }
}

#[async_trait::async_trait]
impl Blobstore for FsBlobstore {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write object {}", path.display()))?;
        Ok(())
    }

    async fn copy(&self, bucket: &str, src: &str, dst: &str) -> Result<()> {
        let src_path = self.object_path(bucket, src);
        let dst_path = self.object_path(bucket, dst);
        if let Some(parent) = dst_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // The copy lands on a sibling temp name; the rename is the single
        // visible swap of the destination object.
        let tmp_path = dst_path.with_extension("tmp");
        tokio::fs::copy(&src_path, &tmp_path)
            .await
            .with_context(|| format!("Failed to copy {}", src_path.display()))?;
        tokio::fs::rename(&tmp_path, &dst_path)
            .await
            .with_context(|| format!("Failed to replace {}", dst_path.display()))?;
        Ok(())
    }
}
