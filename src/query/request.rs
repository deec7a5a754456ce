//! List requests and pages

use serde::Serialize;

use crate::filter::SortDirection;
use crate::model::{Entry, ShardKey};

/// A request for one page of a named list
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    /// Registered list name
    pub list: String,
    /// Restrict to one shard key
    pub shard: Option<ShardKey>,
    /// Token returned as `next_cursor` by the previous page
    pub cursor: Option<String>,
    /// Maximum rows per page
    pub limit: usize,
    /// Paging direction. `Asc` walks the list in its natural order,
    /// `Desc` walks it in reverse.
    pub direction: SortDirection,
    /// Registered sort replacing the list's own sort
    pub sort: Option<String>,
}

impl ListRequest {
    pub fn new(list: impl Into<String>, limit: usize) -> Self {
        Self {
            list: list.into(),
            shard: None,
            cursor: None,
            limit,
            direction: SortDirection::Asc,
            sort: None,
        }
    }

    pub fn in_shard(mut self, shard: impl Into<ShardKey>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Continues from `cursor` if there is one.
    pub fn resume(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn paged(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// One page of a list
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ListPage {
    pub entries: Vec<Entry>,
    /// Present only when the page was full
    pub next_cursor: Option<String>,
}

impl ListPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}
