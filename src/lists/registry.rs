//! Static list registry
//!
//! Built once at startup from the table layout, the named sorts and the list
//! definitions. Every field a list or sort names is resolved to a column
//! here; an unknown name fails the whole build. Nothing is resolved
//! per call afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, AccessResult};
use crate::filter::{Column, Filter, Predicate, SortDirection};

use super::definition::ListDefinition;

/// Column layout of the entry table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableLayout {
    /// Name of the identifier column (default: "id")
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Name of the shard key column (default: "shard")
    #[serde(default = "default_shard_column")]
    pub shard_column: String,

    /// Declared entry fields
    #[serde(default)]
    pub fields: BTreeSet<String>,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_shard_column() -> String {
    "shard".to_string()
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            shard_column: default_shard_column(),
            fields: BTreeSet::new(),
        }
    }
}

impl TableLayout {
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Resolves a configured name to a column.
    pub fn column(&self, name: &str) -> Option<Column> {
        if name == self.id_column {
            Some(Column::Id)
        } else if name == self.shard_column {
            Some(Column::Shard)
        } else if self.fields.contains(name) {
            Some(Column::Field(name.to_string()))
        } else {
            None
        }
    }

    fn validate(&self) -> AccessResult<()> {
        if self.id_column.is_empty() || self.shard_column.is_empty() {
            return Err(AccessError::config("table: column names must not be empty"));
        }
        if self.id_column == self.shard_column {
            return Err(AccessError::config(
                "table: id_column and shard_column must differ",
            ));
        }
        for reserved in [&self.id_column, &self.shard_column] {
            if self.fields.contains(reserved) {
                return Err(AccessError::config(format!(
                    "table: '{}' is a key column and cannot be declared as a field",
                    reserved
                )));
            }
        }
        Ok(())
    }
}

/// A resolved named sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSort {
    pub name: String,
    pub field: String,
    pub column: Column,
}

/// A list with its conditions resolved to a predicate
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredList {
    pub name: String,
    pub predicate: Filter,
    pub sort: Option<NamedSort>,
    pub direction: SortDirection,
    /// Configured names of every field the conditions read
    pub condition_fields: BTreeSet<String>,
}

/// Immutable registry of lists and sorts
#[derive(Debug, Clone, Default)]
pub struct ListRegistry {
    table: TableLayout,
    sorts: BTreeMap<String, NamedSort>,
    lists: BTreeMap<String, RegisteredList>,
}

impl ListRegistry {
    /// Validates and resolves every sort and list.
    pub fn build(
        table: TableLayout,
        sorts: &BTreeMap<String, String>,
        lists: &BTreeMap<String, ListDefinition>,
    ) -> AccessResult<Self> {
        table.validate()?;

        let mut resolved_sorts = BTreeMap::new();
        for (name, field) in sorts {
            let column = table.column(field).ok_or_else(|| {
                AccessError::config(format!("sort '{}': unknown field '{}'", name, field))
            })?;
            resolved_sorts.insert(
                name.clone(),
                NamedSort {
                    name: name.clone(),
                    field: field.clone(),
                    column,
                },
            );
        }

        let mut resolved_lists = BTreeMap::new();
        for (name, definition) in lists {
            let list = Self::resolve_list(&table, &resolved_sorts, name, definition)?;
            resolved_lists.insert(name.clone(), list);
        }

        Ok(Self {
            table,
            sorts: resolved_sorts,
            lists: resolved_lists,
        })
    }

    fn resolve_list(
        table: &TableLayout,
        sorts: &BTreeMap<String, NamedSort>,
        name: &str,
        definition: &ListDefinition,
    ) -> AccessResult<RegisteredList> {
        let mut predicates = Vec::with_capacity(definition.conditions.len());
        let mut condition_fields = BTreeSet::new();

        for condition in &definition.conditions {
            let column = table.column(&condition.field).ok_or_else(|| {
                AccessError::config(format!(
                    "list '{}': unknown field '{}'",
                    name, condition.field
                ))
            })?;
            predicates.push(Predicate::new(column, condition.op, condition.value.clone()));
            condition_fields.insert(condition.field.clone());
        }

        let sort = match &definition.sort {
            Some(sort_name) => Some(sorts.get(sort_name).cloned().ok_or_else(|| {
                AccessError::config(format!("list '{}': unknown sort '{}'", name, sort_name))
            })?),
            None => None,
        };

        Ok(RegisteredList {
            name: name.to_string(),
            predicate: Filter::all_of(predicates),
            sort,
            direction: definition.direction,
            condition_fields,
        })
    }

    pub fn table(&self) -> &TableLayout {
        &self.table
    }

    pub fn list(&self, name: &str) -> Option<&RegisteredList> {
        self.lists.get(name)
    }

    pub fn sort(&self, name: &str) -> Option<&NamedSort> {
        self.sorts.get(name)
    }

    pub fn lists(&self) -> impl Iterator<Item = &RegisteredList> {
        self.lists.values()
    }

    pub fn sorts(&self) -> impl Iterator<Item = &NamedSort> {
        self.sorts.values()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
