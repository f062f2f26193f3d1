//! Storage collaborator abstraction for object storage (GCS, S3, local).
//!
//! This module defines the contract Varve consumes from its backing store.
//! The archive subsystem never interprets storage URIs itself: it joins a
//! table root and a file name through [`Storer::join`] and hands the result
//! back to the same store.
//!
//! ## Semantics the archive relies on
//!
//! - [`Storer::put`] publishes a whole object atomically; readers never
//!   observe a partially-written object. Overwrite is last-write-wins.
//! - [`Storer::mkdir`] and [`Storer::delete`] are idempotent.
//! - [`Storer::get`] reports a missing object as [`Error::NotFound`] so
//!   callers can distinguish "absent" from "failed".
//!
//! Object stores without a directory concept may implement `mkdir` as a
//! no-op; it exists so filesystem-backed implementations can create the
//! table root ahead of per-key writes.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Storage collaborator trait for the archive subsystem.
///
/// All backends (object stores, local filesystem, memory) implement this
/// trait. The contract is designed for cloud object storage semantics:
/// whole-object atomic publish, last-write-wins overwrite.
#[async_trait]
pub trait Storer: Send + Sync + 'static {
    /// Returns true if an object or directory exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Creates a directory (or prefix) if absent.
    ///
    /// Idempotent: creating an existing directory succeeds.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Writes an object, replacing any existing object at `path`.
    ///
    /// The write is atomic at the object level: concurrent readers see
    /// either the old bytes or the new bytes, never a mixture.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Deletes an object.
    ///
    /// Succeeds even if the object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Joins path parts with the store's separator.
    ///
    /// Empty parts are skipped; redundant separators are collapsed.
    fn join(&self, parts: &[&str]) -> String {
        parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Tracks created
/// directories explicitly so `exists` answers for both objects and
/// directory prefixes, mirroring a filesystem-backed store.
#[derive(Debug, Default)]
pub struct MemoryStorer {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    dirs: Arc<RwLock<HashSet<String>>>,
}

impl MemoryStorer {
    /// Creates a new empty memory storer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the paths of all stored objects, sorted.
    ///
    /// Test helper; the archive itself never lists the store.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn object_paths(&self) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        let mut paths: Vec<String> = objects.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl Storer for MemoryStorer {
    async fn exists(&self, path: &str) -> Result<bool> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        if objects.contains_key(path) {
            return Ok(true);
        }
        drop(objects);

        let dirs = self.dirs.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(dirs.contains(path.trim_end_matches('/')))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.dirs
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert(path.trim_end_matches('/').to_string());
        Ok(())
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(path);
        Ok(())
    }
}
