//! Archive pruner: deletes segments for a set of merge keys.
//!
//! Used for retention and compaction cleanup. Deletion is idempotent
//! (removing an already-absent segment is not an error) and carries no
//! cross-key transactionality: a partial failure leaves some keys deleted
//! and others not, and the caller retries the reported remainder.

use futures::StreamExt;
use futures::stream;
use std::sync::Arc;

use varve_core::{ArchivePaths, Storer, TableId};

use crate::error::{ArchiveError, KeyFailure, Result};
use crate::key::MergeKey;

/// Default bound on in-flight per-key deletes.
const MAX_IN_FLIGHT_DELETES: usize = 16;

/// Deletes archived segments through the storage collaborator.
pub struct ArchivePruner {
    storer: Arc<dyn Storer>,
    max_in_flight: usize,
}

impl ArchivePruner {
    /// Creates a pruner over the given store.
    #[must_use]
    pub fn new(storer: Arc<dyn Storer>) -> Self {
        Self {
            storer,
            max_in_flight: MAX_IN_FLIGHT_DELETES,
        }
    }

    /// Overrides the bound on in-flight per-key deletes (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Deletes the segment for each merge key.
    ///
    /// Idempotent: keys with no persisted segment are silently fine.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::PartialDelete`] listing every key whose
    /// delete failed; succeeded keys stay deleted and the caller retries
    /// the listed subset.
    #[tracing::instrument(
        skip(self, table_id, merge_keys),
        fields(table = %table_id, keys = merge_keys.len())
    )]
    pub async fn remove(&self, table_id: &TableId, merge_keys: &[MergeKey]) -> Result<()> {
        let failures: Vec<KeyFailure> = stream::iter(merge_keys)
            .map(|key| {
                let storer = Arc::clone(&self.storer);
                let path = ArchivePaths::segment_path(table_id, key.as_str());
                async move {
                    let result = storer.delete(&path).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .filter_map(|(key, result)| async move {
                result.err().map(|e| KeyFailure {
                    merge_key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
            .await;

        if !failures.is_empty() {
            tracing::error!(failed = failures.len(), "prune completed with failures");
            return Err(ArchiveError::PartialDelete { failures });
        }

        tracing::info!(deleted = merge_keys.len(), "segments pruned");
        Ok(())
    }
}
