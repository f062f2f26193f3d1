//! Error types for archive operations.
//!
//! Two propagation regimes coexist here, deliberately:
//!
//! - Key extraction and reconciliation errors are **batch-fatal**: they
//!   indicate structurally bad input that would corrupt the archive's key
//!   space, so nothing is persisted.
//! - I/O errors during write and delete are **key-scoped**: they are
//!   reported as partial failures listing the failed keys, so the caller
//!   can retry just that subset. Succeeded keys are never rolled back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// A per-key failure inside a partial write or delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFailure {
    /// The merge key whose segment operation failed.
    pub merge_key: String,
    /// Description of the underlying cause.
    pub reason: String,
}

/// Errors that can occur during archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A declared key field was missing from an event. Batch-fatal.
    #[error("missing key field: {field}")]
    MissingKeyField {
        /// Name of the declared key field that could not be resolved.
        field: String,
    },

    /// An event's control fields were missing or invalid. Batch-fatal.
    #[error("malformed event: {message}")]
    MalformedEvent {
        /// Description of what made the event malformed.
        message: String,
    },

    /// A read was requested for a key with no persisted segment.
    ///
    /// Raised rather than skipped, so callers never silently receive
    /// incomplete data.
    #[error("archive segment not found: {path}")]
    ArchiveNotFound {
        /// The segment path that was looked up.
        path: String,
    },

    /// One or more per-key writes failed during a batch write.
    ///
    /// Succeeded keys are NOT rolled back; retry the listed keys.
    #[error("partial write failure: {} key(s) failed", failures.len())]
    PartialWrite {
        /// The keys that failed, with underlying causes.
        failures: Vec<KeyFailure>,
    },

    /// One or more per-key deletes failed during a prune.
    ///
    /// Succeeded keys stay deleted; retry the listed keys.
    #[error("partial delete failure: {} key(s) failed", failures.len())]
    PartialDelete {
        /// The keys that failed, with underlying causes.
        failures: Vec<KeyFailure>,
    },

    /// Storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Segment container encode/decode failed.
    #[error("segment error: {message}")]
    Segment {
        /// Description of the segment failure.
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl ArchiveError {
    /// Creates a storage error from an underlying cause.
    #[must_use]
    pub fn storage(cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: cause.to_string(),
        }
    }
}
