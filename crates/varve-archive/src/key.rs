//! Merge-key extraction.
//!
//! A merge key is the business identifier string under which change events
//! collapse into one logical record. Two events that should collapse to
//! the same record MUST produce an identical key string, so extraction is
//! a pure function of the event payload and the declared key fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ArchiveError, Result};
use crate::event::{ChangeEvent, is_control_field};

/// Separator joining key-field values into a merge key.
pub const KEY_SEPARATOR: &str = "|";

/// The business key string for a logical record.
///
/// Built by concatenating the values of the declared (or inferred) key
/// fields in schema order, joined by [`KEY_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeKey(String);

impl MergeKey {
    /// Creates a merge key from an already-built key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MergeKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Derives the merge key for an event from a declared key-field list.
///
/// Values are concatenated in the given field order. JSON strings
/// contribute their unquoted content; any other value contributes its
/// compact JSON rendering. Null counts as missing.
///
/// # Errors
///
/// Returns [`ArchiveError::MissingKeyField`] if the event lacks a declared
/// field. This is batch-fatal: a record that cannot produce its key would
/// corrupt the archive's key space.
pub fn extract_key(event: &ChangeEvent, key_fields: &[String]) -> Result<MergeKey> {
    let mut parts = Vec::with_capacity(key_fields.len());
    for field in key_fields {
        let value = event
            .fields
            .get(field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ArchiveError::MissingKeyField {
                field: field.clone(),
            })?;
        parts.push(key_text(value));
    }
    Ok(MergeKey(parts.join(KEY_SEPARATOR)))
}

/// Infers candidate key fields for a batch with no declared key.
///
/// The union of all non-control field names across the batch, sorted.
/// This is a best-effort fallback: when the true business key is a strict
/// subset of the payload, events differing in any non-key field will fail
/// to collapse.
#[must_use]
pub fn infer_key_fields(events: &[ChangeEvent]) -> Vec<String> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for event in events {
        for name in event.fields.keys() {
            if !is_control_field(name) {
                names.insert(name);
            }
        }
    }
    names.into_iter().map(str::to_string).collect()
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
