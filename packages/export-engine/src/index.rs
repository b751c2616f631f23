//! The public index manifest pointing at the current batches.

use serde::{Deserialize, Serialize};

/// One batch set: its start interval and the archive paths composing it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchIndex {
    /// Rolling interval at which the batch window starts.
    pub interval_number: i64,
    /// Absolute `/{bucket}/{object}` paths, in batch order.
    pub files: Vec<String>,
}

/// Manifest polled by mobile clients.
///
/// Field names and casing are the deployed client contract; changing them
/// breaks every handset in the field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    /// The large retrospective batch.
    pub full_big_batch: BatchIndex,
    /// The medium retrospective batch.
    pub full_medium_batch: BatchIndex,
    /// One entry per exported day, ascending by start interval.
    pub daily_batches: Vec<BatchIndex>,
}
