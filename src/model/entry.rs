//! Stored entries and their keys

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Store-assigned entry identifier.
///
/// Identifiers are assigned monotonically by the primary and are globally
/// unique across shard keys.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// Creates an identifier with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntryId> for Value {
    fn from(id: EntryId) -> Self {
        Value::Int(id.0 as i64)
    }
}

/// Logical partition value (e.g. a tenant id).
///
/// This is a routing hint, not a physical shard: every key currently
/// resolves to the same backing store.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ShardKey(String);

impl ShardKey {
    /// Creates a shard key.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ShardKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Identifier, `None` until the store assigns one on insert
    pub id: Option<EntryId>,
    /// Logical partition
    pub shard: ShardKey,
    /// Named scalar fields
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Entry {
    /// Creates an entry without an identifier.
    pub fn new(shard: impl Into<ShardKey>) -> Self {
        Self {
            id: None,
            shard: shard.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Sets the identifier.
    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets a field value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets a field value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
