//! # varve-archive
//!
//! Change-data-capture log compaction and content-addressed archive
//! segments.
//!
//! A stream of tagged row-level change events (insert/update/delete, each
//! carrying a sequence number and an age/epoch) is consolidated per
//! logical record key into per-key archive segments: a live segment for
//! the record's current state, or a tombstone segment marking deletion.
//!
//! ```text
//! raw change events
//!        │ parse (control columns → ChangeEvent)
//!        ▼
//! ┌──────────────┐   merge keys    ┌──────────────────┐
//! │  Reconciler  │ ──────────────► │  ArchiveWriter   │ ─► Storer
//! │  (collapse)  │  Live/Tombstone │  (per-key zip)   │
//! └──────────────┘                 └──────────────────┘
//!                                  ┌──────────────────┐
//!                   later reads ─► │  ArchiveReader   │ ◄─ Storer
//!                                  │  (projection)    │
//!                                  └──────────────────┘
//!                                  ┌──────────────────┐
//!                   retention  ─►  │  ArchivePruner   │ ─► Storer
//!                                  └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Last operation wins**: within a batch, events for one key collapse
//!   to the state of the most recent event by `(age, sequence, line)`.
//! - **Idempotent compaction**: segment paths are a pure function of the
//!   merge key, so re-running a batch overwrites segments in place.
//! - **Per-key atomicity**: a segment is published with a single object
//!   put; no partially-written segment is ever visible.
//! - **Retry-the-subset failure model**: write and delete failures are
//!   reported per key; succeeded keys are never rolled back.
//!
//! ## Non-goals
//!
//! This is not a database: no query engine, no cross-key transactions, no
//! read-path indexing beyond direct-by-key lookup. Concurrent writers over
//! overlapping keys must be serialized by the caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod key;
pub mod pruner;
pub mod reader;
pub mod reconciler;
pub mod segment;
pub mod writer;

pub use error::{ArchiveError, KeyFailure, Result};
pub use event::{CONTROL_PREFIX, ChangeEvent, FieldMap, Operation, is_control_field};
pub use key::{KEY_SEPARATOR, MergeKey, extract_key, infer_key_fields};
pub use pruner::ArchivePruner;
pub use reader::{ArchiveReader, ReadResult};
pub use reconciler::{ReconciledRecord, Reconciler};
pub use segment::{SENTINEL_ENTRY, SegmentView, encode_segment, tombstone_segment};
pub use writer::{ArchiveWriter, WriteReport};
