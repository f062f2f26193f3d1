//! Row-level change events.
//!
//! Upstream CDC logs carry rows as flat JSON objects in which a handful of
//! underscore-prefixed control columns (`_OP`, `_SEQ`, `_AGE`, `_NO`) ride
//! alongside the business payload. That stringly-typed convention is
//! confined to the serde boundary: inside this crate an event is an
//! explicit struct with a tagged [`Operation`] and a payload map.
//!
//! Events are immutable once emitted. Within one reconciliation batch,
//! events for the same key are totally ordered by
//! `(age, sequence, line_number)`; sequence numbers are only comparable
//! within the same age.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArchiveError, Result};

/// Prefix marking a control field in a raw log row.
pub const CONTROL_PREFIX: char = '_';

/// Returns true if a field name denotes a control field.
#[must_use]
pub fn is_control_field(name: &str) -> bool {
    name.starts_with(CONTROL_PREFIX)
}

/// The business payload of an event: an insertion-ordered map from field
/// name to JSON value.
pub type FieldMap = serde_json::Map<String, Value>;

/// The kind of row-level mutation an event describes.
///
/// Wire values follow the raw-log convention: `I`, `U`, `D`. A row with no
/// `_OP` column is an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operation {
    /// A new record was inserted.
    #[default]
    #[serde(rename = "I")]
    Insert,
    /// An existing record was updated (full-row payload).
    #[serde(rename = "U")]
    Update,
    /// The record was deleted.
    #[serde(rename = "D")]
    Delete,
}

/// One row-level mutation from the change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The mutation kind (`_OP` column; defaults to insert).
    #[serde(rename = "_OP", default)]
    pub operation: Operation,

    /// Ordering number within an age (`_SEQ` column).
    #[serde(rename = "_SEQ", default)]
    pub sequence: u64,

    /// Epoch/generation identifier (`_AGE` column). Sequence numbers are
    /// only comparable within the same age.
    #[serde(rename = "_AGE", default)]
    pub age: u64,

    /// Line number within the source segment (`_NO` column); breaks
    /// sequence ties.
    #[serde(rename = "_NO", default)]
    pub line_number: u64,

    /// Business payload. May still contain stray control fields from the
    /// raw log; the reconciler strips them before persistence.
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl ChangeEvent {
    /// Creates an event with an empty payload.
    #[must_use]
    pub fn new(operation: Operation, age: u64, sequence: u64, line_number: u64) -> Self {
        Self {
            operation,
            sequence,
            age,
            line_number,
            fields: FieldMap::new(),
        }
    }

    /// Adds a payload field (builder style).
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The total order of this event within its batch, most significant
    /// component first.
    #[must_use]
    pub fn sort_key(&self) -> (u64, u64, u64) {
        (self.age, self.sequence, self.line_number)
    }

    /// Decodes a raw log batch: a JSON array of flat row objects.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MalformedEvent`] if any row fails to
    /// decode. The whole batch is rejected: a partial decode would break
    /// the all-or-nothing reconciliation contract.
    pub fn parse_batch(data: &[u8]) -> Result<Vec<Self>> {
        serde_json::from_slice(data).map_err(|e| ArchiveError::MalformedEvent {
            message: format!("failed to decode raw event batch: {e}"),
        })
    }
}
