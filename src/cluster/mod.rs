//! Backing store abstraction
//!
//! The access layer talks to a primary/replica setup through the `Topology`
//! and `Endpoint` traits. `MemoryCluster` is the in-process implementation
//! used by tests and the CLI.
//!
//! Shard keys are not physical routing keys here: every key resolves to the
//! same topology. Physical sharding would map shard keys to topologies and
//! fan list queries out across them.

mod endpoint;
mod memory;
mod statement;

pub use endpoint::{Endpoint, Topology};
pub use memory::{MemoryCluster, MemoryEndpoint};
pub use statement::{Projection, Statement, StatementResult};
