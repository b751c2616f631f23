//! Batch signing seam and the local ECDSA P-256 signer.

use std::path::Path;

use anyhow::{Context, Result};
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::TryRngCore;

/// Produces the detached signature embedded in `export.sig`.
///
/// The algorithm is fixed: ECDSA over P-256 with SHA-256, DER-encoded —
/// the wire's `1.2.840.10045.4.3.2`. The signature covers the full
/// `export.bin` byte stream including its 16-byte header.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Signs `message`.
    ///
    /// # Errors
    /// Fails when the key backend cannot produce a signature.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Signer holding a P-256 key in process memory.
#[derive(Clone)]
pub struct EcdsaSigner {
    key: SigningKey,
}

impl EcdsaSigner {
    /// Wraps an existing signing key.
    #[must_use]
    pub const fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generates a fresh key from the operating-system RNG.
    ///
    /// # Errors
    /// Fails when the system entropy source fails.
    pub fn generate() -> Result<Self> {
        // Rejection-sample until the 32 bytes land inside the scalar field;
        // out-of-range draws are vanishingly rare.
        loop {
            let mut bytes = [0_u8; 32];
            OsRng
                .try_fill_bytes(&mut bytes)
                .context("System RNG failed")?;
            if let Ok(key) = SigningKey::from_slice(&bytes) {
                return Ok(Self { key });
            }
        }
    }

    /// Reads a raw 32-byte scalar from `path`.
    ///
    /// # Errors
    /// Fails when the file cannot be read or does not hold a valid scalar.
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read signing key from {}", path.display()))?;
        let key = SigningKey::from_slice(&bytes).with_context(|| {
            format!("Signing key at {} is not a valid P-256 scalar", path.display())
        })?;
        Ok(Self { key })
    }

    /// Writes the raw 32-byte scalar to `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// Fails when the key file cannot be written.
    pub fn store_key_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.key.to_bytes().as_slice())
            .with_context(|| format!("Failed to write signing key to {}", path.display()))
    }

    /// Verification half of the key pair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }
}

#[async_trait::async_trait]
impl Signer for EcdsaSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self.key.sign(message);
        Ok(signature.to_der().as_bytes().to_vec())
    }
}
