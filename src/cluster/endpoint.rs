//! Endpoint and topology traits
//!
//! A topology is one primary plus an ordered set of replicas. Endpoint
//! index 0 is the primary; replicas are numbered from 1.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::consistency::ReplicationPosition;
use crate::error::AccessResult;

use super::statement::{Statement, StatementResult};

/// A single database server
pub trait Endpoint: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> String;

    /// Executes a statement. Fails with `ConnectionUnavailable` if the
    /// endpoint is unreachable or `deadline` passes first.
    fn execute(&self, statement: &Statement, deadline: Instant) -> AccessResult<StatementResult>;
}

/// A primary/replica database setup
pub trait Topology: Send + Sync {
    /// The write endpoint.
    fn primary(&self) -> AccessResult<Arc<dyn Endpoint>>;

    /// Number of configured replicas.
    fn replica_count(&self) -> usize;

    /// A particular endpoint by index (0 = primary).
    fn endpoint(&self, index: usize) -> AccessResult<Arc<dyn Endpoint>>;

    /// Any reachable replica. Setups without replicas return the primary.
    fn any_replica(&self) -> AccessResult<Arc<dyn Endpoint>>;

    /// The primary's current change position.
    fn primary_position(&self) -> AccessResult<ReplicationPosition>;

    /// Blocks until every reachable replica applied `position`.
    ///
    /// Returns `Ok(false)` if `deadline` passes first.
    fn wait_for(&self, position: ReplicationPosition, deadline: Instant) -> AccessResult<bool>;

    /// Largest current replica lag, `None` without replicas.
    fn replica_lag(&self) -> Option<Duration>;
}
