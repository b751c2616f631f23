//! Privacy padding: synthetic keys that keep real case counts from leaking
//! through archive size.

use rand::rngs::OsRng;
use rand::{Rng, TryRngCore};
use thiserror::Error;

use crate::model::{DiagnosisType, Exposure, KEY_LENGTH};

/// Padding could not be generated.
#[derive(Debug, Error)]
pub enum PaddingError {
    /// The operating-system RNG refused to produce key bytes.
    #[error("system entropy source failed: {0}")]
    Entropy(String),
}

/// Extends `batch` with synthetic exposures up to a jittered minimum size.
///
/// The target is `min_length` plus a uniform draw from `[0, jitter)`. Each
/// synthetic key is 16 fresh CSPRNG bytes; interval number, interval count,
/// and transmission risk are sampled independently from the real pool so
/// the marginal distributions stay correct while the combinations are new.
/// Diagnosis type is uniform over red and yellow; green never appears in
/// padding.
///
/// An empty batch stays empty: padding never fabricates a batch from
/// nothing.
///
/// # Errors
/// Returns an error only when the system entropy source fails.
pub fn extend_with_padding(
    batch: &mut Vec<Exposure>,
    region: &str,
    min_length: usize,
    jitter: usize,
) -> Result<(), PaddingError> {
    if batch.is_empty() {
        return Ok(());
    }

    let real = batch.clone();
    let mut rng = rand::rng();
    let extra = if jitter == 0 {
        0
    } else {
        rng.random_range(0..jitter)
    };
    let target = min_length + extra;

    while batch.len() < target {
        let mut key = vec![0_u8; KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|err| PaddingError::Entropy(err.to_string()))?;

        let interval_number = real[rng.random_range(0..real.len())].interval_number;
        let interval_count = real[rng.random_range(0..real.len())].interval_count;
        let transmission_risk = real[rng.random_range(0..real.len())].transmission_risk;
        let diagnosis_type = if rng.random_bool(0.5) {
            DiagnosisType::RedWarning
        } else {
            DiagnosisType::YellowWarning
        };

        batch.push(Exposure {
            key,
            transmission_risk,
            interval_number,
            interval_count,
            region: region.to_string(),
            diagnosis_type,
        });
    }

    Ok(())
}
