//! Connection routing across a primary/replica topology
//!
//! Consults the consistency context on every call so that a unit of work
//! never reads its own writes as absent.

mod config;
#[allow(clippy::module_inception)]
mod router;
mod target;

pub use config::RouterConfig;
pub use router::{Connection, ConnectionRouter};
pub use target::ReadTarget;
