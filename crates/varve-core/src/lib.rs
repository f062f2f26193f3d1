//! # varve-core
//!
//! Core abstractions for Varve, a change-data-capture log compactor and
//! content-addressed archive store.
//!
//! This crate provides the primitives shared by all Varve components:
//!
//! - **Storage Trait**: The [`Storer`] collaborator contract for object
//!   storage (plus an in-memory backend for tests)
//! - **Identifiers**: The strongly-typed [`TableId`]
//! - **Path Layout**: [`ArchivePaths`], the single source of truth for
//!   content-addressed segment naming
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Structured-logging initialization helpers
//!
//! ## Crate Boundary
//!
//! `varve-core` is the only crate allowed to define shared primitives.
//! The archive subsystem in `varve-archive` builds on these contracts and
//! never interprets storage URIs or paths on its own.
//!
//! ## Example
//!
//! ```rust
//! use varve_core::prelude::*;
//!
//! let table = TableId::new("orders").unwrap();
//! let path = ArchivePaths::segment_path(&table, "K1");
//! assert!(path.starts_with("archive/orders/"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod paths;
pub mod storer;
pub mod table;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use varve_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::paths::ArchivePaths;
    pub use crate::storer::{MemoryStorer, Storer};
    pub use crate::table::TableId;
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use paths::ArchivePaths;
pub use storer::{MemoryStorer, Storer};
pub use table::TableId;
