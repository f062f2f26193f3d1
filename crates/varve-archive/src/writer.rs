//! Archive writer: persists reconciled batches as per-key segments.
//!
//! Each reconciled key becomes exactly one segment object at its
//! content-addressed path: live keys get a payload segment, tombstoned
//! keys a sentinel-only segment. Per-key puts fan out with bounded
//! concurrency; the order in which segments are published is unspecified
//! and does not matter, because segments are independent.
//!
//! Failure model: a per-key put failure never rolls back keys that were
//! already published. The batch reports every failed key so the caller
//! retries just that subset.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use varve_core::{ArchivePaths, Storer, TableId};

use crate::error::{ArchiveError, KeyFailure, Result};
use crate::key::MergeKey;
use crate::reconciler::ReconciledRecord;
use crate::segment::{encode_segment, tombstone_segment};

/// Default bound on in-flight per-key writes.
const MAX_IN_FLIGHT_WRITES: usize = 16;

/// Report from a batch write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReport {
    /// The epoch the batch was compacted for (reporting only; segment
    /// paths are a function of the merge key alone).
    pub epoch: u64,
    /// Number of live segments written.
    pub live_written: usize,
    /// Number of tombstone segments written.
    pub tombstoned_written: usize,
    /// Total segment bytes written to the store.
    pub bytes_written: u64,
    /// Keys skipped because the field projection emptied their payload.
    pub skipped: Vec<MergeKey>,
}

/// Persists reconciled batches through the storage collaborator.
pub struct ArchiveWriter {
    storer: Arc<dyn Storer>,
    max_in_flight: usize,
}

impl ArchiveWriter {
    /// Creates a writer over the given store.
    #[must_use]
    pub fn new(storer: Arc<dyn Storer>) -> Self {
        Self {
            storer,
            max_in_flight: MAX_IN_FLIGHT_WRITES,
        }
    }

    /// Overrides the bound on in-flight per-key writes (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Writes one segment per reconciled key.
    ///
    /// The table root is created first (idempotent). Live payloads are
    /// restricted to `field_projection` when one is given; unknown fields
    /// are silently omitted, and a key whose projected payload comes out
    /// empty is skipped (logged and listed in the report, not an error).
    ///
    /// An empty live group writes nothing for that group: readers must
    /// treat "segment absent" and "segment empty" as equivalent, and the
    /// reader here does (both read as not-found / empty respectively).
    ///
    /// Re-running the same batch is idempotent: paths are deterministic
    /// and overwrite is last-write-wins at the store.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::PartialWrite`] listing every key whose put
    /// failed; succeeded keys stay published. Encoding errors abort before
    /// any I/O.
    #[tracing::instrument(
        skip(self, table_id, reconciled, field_projection),
        fields(table = %table_id, keys = reconciled.len())
    )]
    pub async fn write_batch(
        &self,
        table_id: &TableId,
        epoch: u64,
        reconciled: BTreeMap<MergeKey, ReconciledRecord>,
        field_projection: Option<&BTreeSet<String>>,
    ) -> Result<WriteReport> {
        self.storer
            .mkdir(&ArchivePaths::table_root(table_id))
            .await
            .map_err(ArchiveError::storage)?;

        // Encode everything up front: encoding failures are batch-fatal
        // and must abort before any segment is published.
        let mut plan: Vec<(MergeKey, String, Bytes)> = Vec::with_capacity(reconciled.len());
        let mut skipped = Vec::new();
        let mut live_written = 0;
        let mut tombstoned_written = 0;

        for (key, record) in reconciled {
            let data = match record {
                ReconciledRecord::Live(fields) => {
                    let fields = match field_projection {
                        Some(projection) => restrict(fields, projection),
                        None => fields,
                    };
                    if field_projection.is_some() && fields.is_empty() {
                        tracing::warn!(key = %key, "projection emptied payload; skipping key");
                        skipped.push(key);
                        continue;
                    }
                    live_written += 1;
                    encode_segment(&fields)?
                }
                ReconciledRecord::Tombstoned => {
                    tombstoned_written += 1;
                    tombstone_segment()?
                }
            };
            let path = ArchivePaths::segment_path(table_id, key.as_str());
            plan.push((key, path, data));
        }

        let bytes_written: u64 = plan.iter().map(|(_, _, data)| data.len() as u64).sum();

        let failures: Vec<KeyFailure> = stream::iter(plan)
            .map(|(key, path, data)| {
                let storer = Arc::clone(&self.storer);
                async move {
                    let result = storer.put(&path, data).await;
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
            tracing::error!(
                failed = failures.len(),
                "batch write completed with per-key failures"
            );
            return Err(ArchiveError::PartialWrite { failures });
        }

        tracing::info!(
            live = live_written,
            tombstoned = tombstoned_written,
            bytes = bytes_written,
            skipped = skipped.len(),
            "batch written"
        );
        Ok(WriteReport {
            epoch,
            live_written,
            tombstoned_written,
            bytes_written,
            skipped,
        })
    }
}

fn restrict(
    fields: crate::event::FieldMap,
    projection: &BTreeSet<String>,
) -> crate::event::FieldMap {
    fields
        .into_iter()
        .filter(|(name, _)| projection.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FieldMap;
    use serde_json::json;
    use varve_core::MemoryStorer;

    fn live(pairs: &[(&str, serde_json::Value)]) -> ReconciledRecord {
        let fields: FieldMap = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        ReconciledRecord::Live(fields)
    }

    fn batch(entries: Vec<(&str, ReconciledRecord)>) -> BTreeMap<MergeKey, ReconciledRecord> {
        entries
            .into_iter()
            .map(|(k, r)| (MergeKey::from(k), r))
            .collect()
    }

    fn select(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[tokio::test]
    async fn writes_one_segment_per_key() {
        let storer = Arc::new(MemoryStorer::new());
        let writer = ArchiveWriter::new(storer.clone());
        let table = TableId::new("orders").unwrap();

        let report = writer
            .write_batch(
                &table,
                1,
                batch(vec![
                    ("K1", live(&[("name", json!("B"))])),
                    ("K2", ReconciledRecord::Tombstoned),
                ]),
                None,
            )
            .await
            .expect("write");

        assert_eq!(report.live_written, 1);
        assert_eq!(report.tombstoned_written, 1);
        assert!(report.bytes_written > 0);
        assert!(report.skipped.is_empty());

        for key in ["K1", "K2"] {
            let path = ArchivePaths::segment_path(&table, key);
            assert!(storer.exists(&path).await.unwrap(), "missing {path}");
        }
    }

    #[tokio::test]
    async fn rewriting_the_same_batch_is_idempotent() {
        let storer = Arc::new(MemoryStorer::new());
        let writer = ArchiveWriter::new(storer.clone());
        let table = TableId::new("orders").unwrap();
        let reconciled = batch(vec![("K1", live(&[("a", json!(1))]))]);

        writer
            .write_batch(&table, 1, reconciled.clone(), None)
            .await
            .expect("first");
        writer
            .write_batch(&table, 1, reconciled, None)
            .await
            .expect("second");

        assert_eq!(storer.object_paths().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn projection_restricts_and_skips_emptied_keys() {
        let storer = Arc::new(MemoryStorer::new());
        let writer = ArchiveWriter::new(storer.clone());
        let table = TableId::new("t").unwrap();

        let report = writer
            .write_batch(
                &table,
                1,
                batch(vec![
                    ("K1", live(&[("a", json!(1)), ("b", json!(2))])),
                    ("K2", live(&[("b", json!(3))])),
                ]),
                Some(&select(&["a"])),
            )
            .await
            .expect("write");

        assert_eq!(report.live_written, 1);
        assert_eq!(report.skipped, vec![MergeKey::from("K2")]);

        let k2 = ArchivePaths::segment_path(&table, "K2");
        assert!(!storer.exists(&k2).await.unwrap());
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let storer = Arc::new(MemoryStorer::new());
        let writer = ArchiveWriter::new(storer.clone());
        let table = TableId::new("t").unwrap();

        let report = writer
            .write_batch(&table, 7, BTreeMap::new(), None)
            .await
            .expect("write");

        assert_eq!(report.epoch, 7);
        assert_eq!(report.live_written + report.tombstoned_written, 0);
        assert!(storer.object_paths().unwrap().is_empty());
    }
}
