//! Statements sent to endpoints and their results

use std::collections::BTreeMap;
use std::fmt;

use crate::consistency::ReplicationPosition;
use crate::filter::{Filter, OrderKey};
use crate::model::{Entry, EntryId, ShardKey, Value};

/// Which fields a select returns. Identifier and shard key are always returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Every field
    All,
    /// Only the named fields
    Fields(Vec<String>),
}

/// A single statement against the entry table
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Filtered, ordered, optionally limited read
    Select {
        filter: Filter,
        order: Vec<OrderKey>,
        limit: Option<usize>,
        projection: Projection,
    },
    /// Number of rows matching a filter
    Count { filter: Filter },
    /// Insert a new row; the primary assigns the identifier
    Insert { entry: Entry },
    /// Replace the fields of the row keyed by (id, shard)
    Update {
        id: EntryId,
        shard: ShardKey,
        fields: BTreeMap<String, Value>,
    },
    /// Delete the row keyed by (id, shard)
    Delete { id: EntryId, shard: ShardKey },
}

impl Statement {
    /// Returns true for statements that change data
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Statement::Insert { .. } | Statement::Update { .. } | Statement::Delete { .. }
        )
    }

    /// Short statement kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select { .. } => "select",
            Statement::Count { .. } => "count",
            Statement::Insert { .. } => "insert",
            Statement::Update { .. } => "update",
            Statement::Delete { .. } => "delete",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select {
                filter,
                order,
                limit,
                projection,
            } => {
                match projection {
                    Projection::All => write!(f, "SELECT *")?,
                    Projection::Fields(fields) => write!(f, "SELECT {}", fields.join(", "))?,
                }
                write!(f, " WHERE {}", filter)?;
                if !order.is_empty() {
                    let keys: Vec<String> = order.iter().map(|k| k.to_string()).collect();
                    write!(f, " ORDER BY {}", keys.join(", "))?;
                }
                if let Some(limit) = limit {
                    write!(f, " LIMIT {}", limit)?;
                }
                Ok(())
            }
            Statement::Count { filter } => write!(f, "SELECT COUNT(*) WHERE {}", filter),
            Statement::Insert { entry } => write!(f, "INSERT INTO shard {}", entry.shard),
            Statement::Update { id, shard, .. } => {
                write!(f, "UPDATE WHERE <id> = {} AND <shard> = '{}'", id, shard)
            }
            Statement::Delete { id, shard } => {
                write!(f, "DELETE WHERE <id> = {} AND <shard> = '{}'", id, shard)
            }
        }
    }
}

/// Result of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// Rows returned by a select
    Rows(Vec<Entry>),
    /// Row count
    Count(u64),
    /// Identifier assigned by an insert, and the position of the change
    Inserted {
        id: EntryId,
        position: ReplicationPosition,
    },
    /// Rows affected by an update or delete
    Affected {
        rows: u64,
        position: ReplicationPosition,
    },
}
