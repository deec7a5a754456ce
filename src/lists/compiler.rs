//! Condition compiler
//!
//! Turns a list name into the predicate, sort column and natural direction
//! that list queries run with, and reports every field the registered lists
//! and sorts depend on.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{AccessError, AccessResult};
use crate::filter::{Column, Filter, FilterEvaluator, SortDirection};
use crate::model::Entry;

use super::registry::{ListRegistry, NamedSort};

/// A list ready to be queried
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledList {
    pub name: String,
    pub predicate: Filter,
    pub sort: Option<NamedSort>,
    /// Natural direction of the list
    pub direction: SortDirection,
}

impl CompiledList {
    pub fn sort_column(&self) -> Option<&Column> {
        self.sort.as_ref().map(|s| &s.column)
    }

    pub fn sort_name(&self) -> Option<&str> {
        self.sort.as_ref().map(|s| s.name.as_str())
    }
}

impl fmt::Display for CompiledList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "list {}: WHERE {}", self.name, self.predicate)?;
        match &self.sort {
            Some(sort) => write!(f, " SORT {} ({})", sort.name, self.direction),
            None => write!(f, " SORT <id> ({})", self.direction),
        }
    }
}

/// Compiles registered lists
#[derive(Debug, Clone)]
pub struct ConditionCompiler {
    registry: Arc<ListRegistry>,
}

impl ConditionCompiler {
    pub fn new(registry: Arc<ListRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ListRegistry {
        &self.registry
    }

    /// Compiles `name` with its own sort.
    pub fn compile(&self, name: &str) -> AccessResult<CompiledList> {
        self.compile_with_sort(name, None)
    }

    /// Compiles `name`, optionally replacing its sort with another registered one.
    ///
    /// The list's natural direction is kept when the sort is replaced.
    pub fn compile_with_sort(
        &self,
        name: &str,
        sort_override: Option<&str>,
    ) -> AccessResult<CompiledList> {
        let list = self
            .registry
            .list(name)
            .ok_or_else(|| AccessError::UnknownList(name.to_string()))?;

        let sort = match sort_override {
            Some(sort_name) => Some(
                self.registry
                    .sort(sort_name)
                    .cloned()
                    .ok_or_else(|| AccessError::UnknownSort(sort_name.to_string()))?,
            ),
            None => list.sort.clone(),
        };

        Ok(CompiledList {
            name: list.name.clone(),
            predicate: list.predicate.clone(),
            sort,
            direction: list.direction,
        })
    }

    /// Every field name read by any list condition or any registered sort.
    ///
    /// Re-reading exactly these fields after a mutation is enough to decide
    /// which lists an entry belongs to.
    pub fn all_conditions(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        for list in self.registry.lists() {
            fields.extend(list.condition_fields.iter().cloned());
        }
        for sort in self.registry.sorts() {
            fields.insert(sort.field.clone());
        }
        fields
    }

    /// Resolves a configured field name to a column.
    pub fn column(&self, field: &str) -> Option<Column> {
        self.registry.table().column(field)
    }

    /// Names of the lists whose conditions `entry` satisfies.
    pub fn lists_matching(&self, entry: &Entry) -> Vec<String> {
        self.registry
            .lists()
            .filter(|list| FilterEvaluator::matches(entry, &list.predicate))
            .map(|list| list.name.clone())
            .collect()
    }
}
