//! Entry storage surface used by business logic

mod entry_store;

pub use entry_store::EntryStore;
