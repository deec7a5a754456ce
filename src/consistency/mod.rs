//! Consistency tracking
//!
//! Once a unit of work has written to a domain it must never observe that
//! write as absent, but it also must not pay a synchronous replica catch-up
//! wait on every later read. Replica reads are redirected to the primary
//! cheaply; only reads that need a specific replica pay the wait, once.
//!
//! State lives in a `ConsistencyContext` threaded through every call rather
//! than in process-wide statics.

mod position;
mod tracker;

pub use position::ReplicationPosition;
pub use tracker::{
    ConsistencyContext, ConsistencyTracker, Domain, ReadResolution, DEFAULT_DOMAIN,
};
