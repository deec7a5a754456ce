//! Entry sorting
//!
//! Sorts by a list of order keys, lexicographically and deterministically.

use std::cmp::Ordering;

use crate::model::Entry;

use super::ast::OrderKey;

/// Sorts entries by order keys
pub struct EntrySorter;

impl EntrySorter {
    /// Sorts entries in place. Stable for entries equal on every key.
    pub fn sort(entries: &mut [Entry], keys: &[OrderKey]) {
        entries.sort_by(|a, b| Self::compare(a, b, keys));
    }

    /// Compares two entries under the given keys.
    pub fn compare(a: &Entry, b: &Entry, keys: &[OrderKey]) -> Ordering {
        for key in keys {
            let ordering = key.column.read(a).total_cmp(&key.column.read(b));
            let ordering = key.direction.orient(ordering);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
