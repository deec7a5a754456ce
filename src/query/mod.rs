//! Cursor-paginated list queries

mod bound;
mod builder;
mod request;

pub use bound::PageOrder;
pub use builder::{ListPlan, ListQueryBuilder, PageStart};
pub use request::{ListPage, ListRequest};
