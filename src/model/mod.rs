//! Data model: entries, their keys, and scalar values

mod entry;
mod value;

pub use entry::{Entry, EntryId, ShardKey};
pub use value::Value;
