//! Event reconciliation: collapsing a batch of change events into one
//! final state per merge key.
//!
//! The reconciler is a single-pass, single-threaded, CPU-bound transform
//! over an in-memory batch. It sorts events most-recent-first and folds
//! them into an immutable result map in which the first resolution per key
//! wins, which is exactly "last operation (by event order) wins".
//!
//! Failure is all-or-nothing per batch: a malformed event or an
//! unresolvable key aborts reconciliation and nothing is persisted.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::event::{ChangeEvent, FieldMap, Operation, is_control_field};
use crate::key::{MergeKey, extract_key, infer_key_fields};

/// The final state of one merge key within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciledRecord {
    /// The record exists with this payload (control fields stripped).
    Live(FieldMap),
    /// The record was deleted as of this batch.
    Tombstoned,
}

impl ReconciledRecord {
    /// Returns true if the record is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Returns the live payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&FieldMap> {
        match self {
            Self::Live(fields) => Some(fields),
            Self::Tombstoned => None,
        }
    }
}

/// Collapses change-event batches per merge key.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    key_fields: Vec<String>,
}

impl Reconciler {
    /// Creates a reconciler with a declared key-field list.
    ///
    /// An empty list enables the inferred-key fallback: the union of all
    /// non-control field names in the batch, sorted (see
    /// [`infer_key_fields`]).
    #[must_use]
    pub fn new(key_fields: Vec<String>) -> Self {
        Self { key_fields }
    }

    /// Collapses all events of a batch into one final state per key.
    ///
    /// Events are stable-sorted by `(age, sequence, line_number)`
    /// descending, then folded once: the first event seen for a key (the
    /// most recent) determines the outcome. A more recent insert/update
    /// supersedes an older delete and vice versa, so every touched key
    /// resolves to exactly one of live or tombstoned.
    ///
    /// An empty batch produces an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ArchiveError::MissingKeyField`] if any event lacks
    /// a declared key field. The whole batch is rejected; partial results
    /// are never returned.
    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub fn reconcile(
        &self,
        mut events: Vec<ChangeEvent>,
    ) -> Result<BTreeMap<MergeKey, ReconciledRecord>> {
        if events.is_empty() {
            return Ok(BTreeMap::new());
        }

        let inferred;
        let key_fields: &[String] = if self.key_fields.is_empty() {
            inferred = infer_key_fields(&events);
            tracing::debug!(fields = ?inferred, "no key fields declared; inferred from batch");
            &inferred
        } else {
            &self.key_fields
        };

        // Stable sort keeps input order among full ties, for determinism.
        events.sort_by_key(|e| Reverse(e.sort_key()));

        let mut resolved: BTreeMap<MergeKey, ReconciledRecord> = BTreeMap::new();
        for event in events {
            let key = extract_key(&event, key_fields)?;
            if resolved.contains_key(&key) {
                // A more recent event already determined the outcome.
                continue;
            }
            let record = match event.operation {
                Operation::Delete => ReconciledRecord::Tombstoned,
                Operation::Insert | Operation::Update => {
                    ReconciledRecord::Live(strip_control_fields(event.fields))
                }
            };
            resolved.insert(key, record);
        }

        let live = resolved.values().filter(|r| r.is_live()).count();
        tracing::debug!(
            keys = resolved.len(),
            live,
            tombstoned = resolved.len() - live,
            "batch reconciled"
        );
        Ok(resolved)
    }
}

fn strip_control_fields(fields: FieldMap) -> FieldMap {
    fields
        .into_iter()
        .filter(|(name, _)| !is_control_field(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keyed(op: Operation, age: u64, seq: u64, no: u64, key: &str) -> ChangeEvent {
        ChangeEvent::new(op, age, seq, no).with_field("id", json!(key))
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(vec!["id".to_string()])
    }

    #[test]
    fn empty_batch_produces_empty_map() {
        assert!(reconciler().reconcile(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn insert_then_delete_collapses_to_tombstoned() {
        let events = vec![
            keyed(Operation::Insert, 1, 1, 0, "K"),
            keyed(Operation::Delete, 1, 2, 0, "K"),
        ];
        let result = reconciler().reconcile(events).unwrap();
        assert_eq!(result[&MergeKey::from("K")], ReconciledRecord::Tombstoned);
    }

    #[test]
    fn delete_then_more_recent_insert_collapses_to_live() {
        let events = vec![
            keyed(Operation::Delete, 1, 1, 0, "K"),
            keyed(Operation::Insert, 1, 2, 0, "K").with_field("a", json!(1)),
        ];
        let result = reconciler().reconcile(events).unwrap();
        let payload = result[&MergeKey::from("K")].payload().expect("live");
        assert_eq!(payload["a"], json!(1));
    }

    #[test]
    fn last_write_wins_is_input_order_independent() {
        let forward = vec![
            keyed(Operation::Insert, 1, 1, 0, "K").with_field("name", json!("A")),
            keyed(Operation::Update, 1, 2, 0, "K").with_field("name", json!("B")),
            keyed(Operation::Update, 2, 1, 0, "K").with_field("name", json!("C")),
        ];
        let mut shuffled = forward.clone();
        shuffled.rotate_left(1);
        shuffled.swap(0, 1);

        let a = reconciler().reconcile(forward).unwrap();
        let b = reconciler().reconcile(shuffled).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a[&MergeKey::from("K")].payload().unwrap()["name"],
            json!("C")
        );
    }

    #[test]
    fn age_dominates_sequence() {
        let events = vec![
            keyed(Operation::Delete, 2, 1, 0, "K"),
            keyed(Operation::Insert, 1, 99, 0, "K"),
        ];
        let result = reconciler().reconcile(events).unwrap();
        assert_eq!(result[&MergeKey::from("K")], ReconciledRecord::Tombstoned);
    }

    #[test]
    fn line_number_breaks_sequence_ties() {
        let events = vec![
            keyed(Operation::Update, 1, 1, 1, "K").with_field("v", json!("old")),
            keyed(Operation::Update, 1, 1, 2, "K").with_field("v", json!("new")),
        ];
        let result = reconciler().reconcile(events).unwrap();
        assert_eq!(
            result[&MergeKey::from("K")].payload().unwrap()["v"],
            json!("new")
        );
    }

    #[test]
    fn control_fields_are_stripped_from_live_payloads() {
        let events =
            vec![keyed(Operation::Insert, 1, 1, 0, "K").with_field("_stray", json!("x"))];
        let result = reconciler().reconcile(events).unwrap();
        let payload = result[&MergeKey::from("K")].payload().unwrap();
        assert!(!payload.contains_key("_stray"));
        assert!(payload.contains_key("id"));
    }

    #[test]
    fn missing_key_field_aborts_the_batch() {
        let events = vec![
            keyed(Operation::Insert, 1, 2, 0, "K"),
            ChangeEvent::new(Operation::Insert, 1, 1, 0).with_field("other", json!(1)),
        ];
        assert!(reconciler().reconcile(events).is_err());
    }

    #[test]
    fn inferred_key_collapses_identical_payloads() {
        let events = vec![
            ChangeEvent::new(Operation::Insert, 1, 1, 0).with_field("a", json!("x")),
            ChangeEvent::new(Operation::Delete, 1, 2, 0).with_field("a", json!("x")),
        ];
        let result = Reconciler::default().reconcile(events).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[&MergeKey::from("x")], ReconciledRecord::Tombstoned);
    }

    #[test]
    fn scenario_two_keys_resolve_independently() {
        let events = vec![
            ChangeEvent::new(Operation::Insert, 1, 1, 0)
                .with_field("id", json!("K1"))
                .with_field("name", json!("A")),
            ChangeEvent::new(Operation::Update, 1, 2, 0)
                .with_field("id", json!("K1"))
                .with_field("name", json!("B")),
            ChangeEvent::new(Operation::Delete, 1, 1, 1).with_field("id", json!("K2")),
        ];
        let result = reconciler().reconcile(events).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result[&MergeKey::from("K1")].payload().unwrap()["name"],
            json!("B")
        );
        assert_eq!(result[&MergeKey::from("K2")], ReconciledRecord::Tombstoned);
    }
}
