//! Filter evaluation against entries
//!
//! Comparisons use the total value order. A missing field reads as `Null`,
//! so a cursor bound over a sparsely populated sort field still partitions
//! the list cleanly.

use crate::model::Entry;

use super::ast::{Filter, Predicate};

/// Evaluates filters against entries
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Checks if an entry matches the filter
    pub fn matches(entry: &Entry, filter: &Filter) -> bool {
        match filter {
            Filter::All => true,
            Filter::Predicate(p) => Self::matches_predicate(entry, p),
            Filter::And(children) => children.iter().all(|c| Self::matches(entry, c)),
            Filter::Or(children) => children.iter().any(|c| Self::matches(entry, c)),
        }
    }

    fn matches_predicate(entry: &Entry, predicate: &Predicate) -> bool {
        let actual = predicate.column.read(entry);
        predicate.op.accepts(actual.total_cmp(&predicate.value))
    }
}
