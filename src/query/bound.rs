//! Cursor bounds and page ordering
//!
//! A page is ordered by the sort column (if any) and then the identifier.
//! The cursor is the last row already delivered; the bound keeps only rows
//! strictly beyond it in that ordering:
//!
//! ```text
//! (sort op s) OR (sort = s AND id op' i)
//! ```
//!
//! `op` follows the sort column's direction and `op'` the identifier's, each
//! `>` ascending and `<` descending. Identifiers are unique, so "strictly
//! beyond" partitions the list exactly: nothing is skipped or repeated even
//! when many rows share a sort value.

use crate::cursor::Cursor;
use crate::filter::{Column, Filter, OrderKey, Predicate, SortDirection};

/// Directions of both ordering columns for one page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOrder {
    pub sort: SortDirection,
    pub id: SortDirection,
}

impl PageOrder {
    /// Composes a list's natural direction with a paging direction.
    ///
    /// The sort column follows the composition. The identifier tiebreak
    /// follows the paging direction, except for unsorted lists where the
    /// identifier is the sort column.
    pub fn new(natural: SortDirection, paging: SortDirection, sorted: bool) -> Self {
        let sort = natural.then(paging);
        let id = if sorted { paging } else { sort };
        Self { sort, id }
    }

    /// ORDER BY keys for a page.
    pub fn keys(&self, sort_column: Option<&Column>) -> Vec<OrderKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(column) = sort_column {
            keys.push(OrderKey::new(column.clone(), self.sort));
        }
        keys.push(OrderKey::new(Column::Id, self.id));
        keys
    }

    /// Filter keeping only rows strictly after `cursor`.
    ///
    /// The cursor's shape must match `sort_column` (checked by the caller);
    /// a sort value without a sort column is ignored.
    pub fn bound(&self, sort_column: Option<&Column>, cursor: &Cursor) -> Filter {
        let id_beyond = Predicate::beyond(Column::Id, self.id, cursor.id);

        match (sort_column, &cursor.sort_value) {
            (Some(column), Some(value)) => Filter::Or(vec![
                Predicate::beyond(column.clone(), self.sort, value.clone()).into(),
                Filter::all_of([Predicate::eq(column.clone(), value.clone()), id_beyond]),
            ]),
            _ => id_beyond.into(),
        }
    }
}
