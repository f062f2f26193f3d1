//! Archive segment container codec.
//!
//! A segment is a deflate-compressed zip archive holding one reconciled
//! record:
//!
//! - one entry per payload field: entry name is the base32 (RFC 4648, no
//!   padding) encoding of the field name so arbitrary field-name
//!   characters survive; entry body is the field value as UTF-8 JSON
//! - one reserved empty sentinel entry marking the archive as data-only
//!
//! A tombstone segment is sentinel-only. The sentinel name `_` lies
//! outside the base32 alphabet, so it can never collide with an encoded
//! field name.
//!
//! The entry layout is a durable on-store contract, alongside the naming
//! scheme in `varve_core::paths`.

use base32::Alphabet;
use bytes::Bytes;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

use crate::error::{ArchiveError, Result};
use crate::event::FieldMap;

/// Reserved entry name marking a segment as data-only.
pub const SENTINEL_ENTRY: &str = "_";

const ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Encodes a field name into a text-safe archive entry name.
#[must_use]
pub fn encode_field_name(name: &str) -> String {
    base32::encode(ALPHABET, name.as_bytes())
}

/// Decodes an archive entry name back into the original field name.
///
/// # Errors
///
/// Returns [`ArchiveError::Segment`] if the entry name is not valid
/// base32 or does not decode to UTF-8.
pub fn decode_field_name(entry: &str) -> Result<String> {
    let raw = base32::decode(ALPHABET, entry).ok_or_else(|| ArchiveError::Segment {
        message: format!("entry name is not valid base32: {entry}"),
    })?;
    String::from_utf8(raw).map_err(|e| ArchiveError::Segment {
        message: format!("entry name is not UTF-8: {e}"),
    })
}

/// Serializes a live record's payload into segment bytes.
///
/// # Errors
///
/// Returns [`ArchiveError::Segment`] if the container cannot be built or
/// [`ArchiveError::Serialization`] if a field value cannot be serialized.
pub fn encode_segment(fields: &FieldMap) -> Result<Bytes> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, value) in fields {
        let body = serde_json::to_vec(value).map_err(|e| ArchiveError::Serialization {
            message: format!("failed to serialize field '{name}': {e}"),
        })?;
        writer
            .start_file(encode_field_name(name), options)
            .map_err(container_err)?;
        writer.write_all(&body).map_err(|e| ArchiveError::Segment {
            message: format!("failed to write entry body: {e}"),
        })?;
    }

    writer
        .start_file(SENTINEL_ENTRY, options)
        .map_err(container_err)?;

    let cursor = writer.finish().map_err(container_err)?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Serializes a tombstone: a sentinel-only segment marking deletion.
///
/// # Errors
///
/// Returns [`ArchiveError::Segment`] if the container cannot be built.
pub fn tombstone_segment() -> Result<Bytes> {
    encode_segment(&FieldMap::new())
}

/// A parsed segment, ready for field projection.
#[derive(Debug)]
pub struct SegmentView {
    entries: Vec<SegmentEntry>,
}

#[derive(Debug)]
struct SegmentEntry {
    /// Decoded field name; `None` for the sentinel entry.
    field: Option<String>,
    body: Vec<u8>,
    size: u64,
}

impl SegmentView {
    /// Parses segment bytes and enumerates all entries.
    ///
    /// Tolerates sentinel-only archives (pure tombstones): they parse to a
    /// view whose projections are empty.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Segment`] if the container is corrupt or an
    /// entry name cannot be decoded.
    pub fn parse(data: Bytes) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(container_err)?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(container_err)?;
            let size = entry.size();
            let name = entry.name().to_string();

            if name == SENTINEL_ENTRY {
                entries.push(SegmentEntry {
                    field: None,
                    body: Vec::new(),
                    size,
                });
                continue;
            }

            let field = decode_field_name(&name)?;
            let mut body = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
            entry.read_to_end(&mut body).map_err(|e| ArchiveError::Segment {
                message: format!("failed to read entry '{name}': {e}"),
            })?;
            entries.push(SegmentEntry {
                field: Some(field),
                body,
                size,
            });
        }

        Ok(Self { entries })
    }

    /// Sum of the uncompressed sizes of every entry, for read accounting.
    ///
    /// Counts all entries, whether or not a projection selects them.
    #[must_use]
    pub fn entry_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Reconstructs the requested fields from the segment.
    ///
    /// Fields absent from the segment are simply omitted (not an error),
    /// so a caller can ask for a superset of what was archived.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Serialization`] if a selected entry's body
    /// is not valid JSON.
    pub fn project(&self, fields: &BTreeSet<String>) -> Result<FieldMap> {
        let mut record = FieldMap::new();
        for entry in &self.entries {
            let Some(field) = &entry.field else {
                continue;
            };
            if !fields.contains(field) {
                continue;
            }
            let value = serde_json::from_slice(&entry.body).map_err(|e| {
                ArchiveError::Serialization {
                    message: format!("failed to decode field '{field}': {e}"),
                }
            })?;
            record.insert(field.clone(), value);
        }
        Ok(record)
    }
}

fn container_err(e: zip::result::ZipError) -> ArchiveError {
    ArchiveError::Segment {
        message: format!("zip container error: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn select(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn field_name_encoding_roundtrips() {
        for name in ["a", "order id", "日本語", "weird/|:*name"] {
            let encoded = encode_field_name(name);
            assert_ne!(encoded, SENTINEL_ENTRY);
            assert_eq!(decode_field_name(&encoded).unwrap(), name);
        }
    }

    #[test]
    fn non_base32_entry_name_is_rejected() {
        assert!(decode_field_name("not base32!").is_err());
    }

    #[test]
    fn segment_roundtrips_payload() {
        let payload = fields(&[("a", json!(1)), ("b", json!("x"))]);
        let bytes = encode_segment(&payload).unwrap();

        let view = SegmentView::parse(bytes).unwrap();
        let record = view.project(&select(&["a", "b"])).unwrap();
        assert_eq!(record["a"], json!(1));
        assert_eq!(record["b"], json!("x"));
    }

    #[test]
    fn projection_omits_unarchived_fields() {
        let payload = fields(&[("a", json!(1))]);
        let view = SegmentView::parse(encode_segment(&payload).unwrap()).unwrap();

        let record = view.project(&select(&["a", "missing"])).unwrap();
        assert_eq!(record.len(), 1);
        assert!(!record.contains_key("missing"));
    }

    #[test]
    fn tombstone_projects_to_empty_record() {
        let view = SegmentView::parse(tombstone_segment().unwrap()).unwrap();
        assert!(view.project(&select(&["anything"])).unwrap().is_empty());
        assert_eq!(view.entry_bytes(), 0);
    }

    #[test]
    fn entry_bytes_counts_unselected_entries() {
        let payload = fields(&[("a", json!("0123456789")), ("b", json!(1))]);
        let view = SegmentView::parse(encode_segment(&payload).unwrap()).unwrap();

        // "0123456789" serializes to 12 bytes, 1 to a single byte.
        assert_eq!(view.entry_bytes(), 13);
        // Accounting is independent of the projection.
        assert!(view.project(&select(&["b"])).unwrap().len() == 1);
        assert_eq!(view.entry_bytes(), 13);
    }

    #[test]
    fn corrupt_container_is_a_segment_error() {
        let err = SegmentView::parse(Bytes::from_static(b"not a zip")).unwrap_err();
        assert!(matches!(err, ArchiveError::Segment { .. }));
    }

    #[test]
    fn nested_values_survive_the_roundtrip() {
        let payload = fields(&[("nested", json!({"a": [1, 2, {"b": null}]}))]);
        let view = SegmentView::parse(encode_segment(&payload).unwrap()).unwrap();
        let record = view.project(&select(&["nested"])).unwrap();
        assert_eq!(record["nested"], json!({"a": [1, 2, {"b": null}]}));
    }
}
