//! Strongly-typed table identifier.
//!
//! Table identifiers in Varve are caller-assigned logical names. They are:
//! - **Strongly typed**: prevents mixing a table name with a merge key or
//!   a path at compile time
//! - **Path-safe**: validated so they can be embedded in storage paths
//!   without escaping

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The logical identifier of an archived table.
///
/// A table is the unit under which change events are compacted; each table
/// has its own root prefix in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    /// Creates a table ID from a caller-assigned name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the name is empty or contains a
    /// path separator (the ID is embedded verbatim in storage paths).
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidInput("table ID must not be empty".into()));
        }
        if name.contains('/') {
            return Err(Error::InvalidInput(format!(
                "table ID must not contain '/': {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the table name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
