//! replistore - replica-aware entry storage access layer
//!
//! Routes reads and writes across a primary/replica topology with
//! read-your-writes consistency per unit of work, and serves named lists
//! with cursor pagination that stays stable while rows share sort values.
//!
//! Components, leaves first:
//! - `cursor`: opaque cursor tokens (`OffsetCodec`)
//! - `lists`: list registry and `ConditionCompiler`
//! - `consistency`: per-domain write tracking (`ConsistencyContext`)
//! - `router`: endpoint selection and catch-up waits (`ConnectionRouter`)
//! - `query`: cursor-bounded list pages (`ListQueryBuilder`)
//! - `store`: entry CRUD and condition re-evaluation (`EntryStore`)

pub mod access;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod consistency;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod lists;
pub mod model;
pub mod observability;
pub mod query;
pub mod router;
pub mod store;

pub use access::AccessLayer;
pub use config::AccessConfig;
pub use consistency::{ConsistencyContext, Domain};
pub use error::{AccessError, AccessResult};
