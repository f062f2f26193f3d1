//! Canonical storage paths for the Varve archive.
//!
//! This module is the **single source of truth** for all archive storage
//! paths. All writers and readers must use these functions to construct
//! paths; no hardcoded path strings should exist outside this module.
//!
//! # Path Layout
//!
//! ```text
//! archive/
//! └── {table_id}/
//!     └── {hash_prefix}-{merge_key}.zip
//! ```
//!
//! `hash_prefix` is the first four hex characters of the MD5 digest of the
//! merge key. It exists solely to spread segments evenly across storage
//! prefixes; it is NOT a content hash of the payload.
//!
//! # Durable Format Contract
//!
//! The naming scheme is a versioned on-store contract. Changing the hash
//! function, the prefix length, or the extension breaks reachability of
//! previously written segments and must be treated as a breaking format
//! change.

use md5::{Digest, Md5};

use crate::table::TableId;

/// Canonical path generator for archive storage.
///
/// Naming is a pure function of the merge key: calling any function here
/// twice with the same arguments returns the same path, on the write path
/// and on the read path alike.
///
/// # Example
///
/// ```
/// use varve_core::paths::ArchivePaths;
/// use varve_core::table::TableId;
///
/// let table = TableId::new("orders").unwrap();
/// let path = ArchivePaths::segment_path(&table, "K1");
/// assert_eq!(path, ArchivePaths::segment_path(&table, "K1"));
/// assert!(path.ends_with("-K1.zip"));
/// ```
pub struct ArchivePaths;

impl ArchivePaths {
    /// File extension for archive segments.
    pub const SEGMENT_EXT: &'static str = ".zip";

    /// Number of hex characters in the distribution prefix.
    pub const PREFIX_LEN: usize = 4;

    /// Returns the distribution prefix for a merge key.
    ///
    /// First [`Self::PREFIX_LEN`] hex characters of `md5(merge_key)`.
    #[must_use]
    pub fn hash_prefix(merge_key: &str) -> String {
        let digest = Md5::digest(merge_key.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(Self::PREFIX_LEN);
        hex
    }

    /// Returns the file name of the segment holding a merge key.
    ///
    /// Format: `{hash_prefix}-{merge_key}{ext}`. Injective in `merge_key`:
    /// the full key is part of the name, so distinct keys never collide
    /// even when their prefixes do.
    #[must_use]
    pub fn segment_name(merge_key: &str) -> String {
        format!(
            "{}-{}{}",
            Self::hash_prefix(merge_key),
            merge_key,
            Self::SEGMENT_EXT
        )
    }

    /// Returns the root prefix for a table's segments.
    #[must_use]
    pub fn table_root(table_id: &TableId) -> String {
        format!("archive/{table_id}")
    }

    /// Returns the full path of the segment holding a merge key.
    #[must_use]
    pub fn segment_path(table_id: &TableId, merge_key: &str) -> String {
        format!(
            "{}/{}",
            Self::table_root(table_id),
            Self::segment_name(merge_key)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_prefix_matches_known_md5_vectors() {
        // RFC 1321 test vectors: md5("") and md5("abc").
        assert_eq!(ArchivePaths::hash_prefix(""), "d41d");
        assert_eq!(ArchivePaths::hash_prefix("abc"), "9001");
    }

    #[test]
    fn segment_path_is_deterministic() {
        let table = TableId::new("orders").unwrap();
        assert_eq!(
            ArchivePaths::segment_path(&table, "K1"),
            ArchivePaths::segment_path(&table, "K1")
        );
    }

    #[test]
    fn segment_name_embeds_full_key() {
        let name = ArchivePaths::segment_name("cust|42");
        assert_eq!(name.len(), 4 + 1 + "cust|42".len() + 4);
        assert!(name.ends_with("-cust|42.zip"));
    }

    #[test]
    fn distinct_keys_produce_distinct_paths() {
        let table = TableId::new("t").unwrap();
        assert_ne!(
            ArchivePaths::segment_path(&table, "a"),
            ArchivePaths::segment_path(&table, "b")
        );
    }
}
