//! Connection routing
//!
//! Picks the endpoint an operation runs on:
//!
//! - `Primary` marks the domain written and hands out the primary. If the
//!   primary is unreachable the call fails; there is nothing to fall back to.
//! - `Replica` goes to any replica unless the domain has an outstanding
//!   write, in which case it is served by the primary without waiting. The
//!   flag stays set, so repeated replica reads keep going to the primary.
//! - `Specific(n)` on a written domain first waits for replicas to reach the
//!   primary's current position, then clears the flag. A wait that times out
//!   leaves the flag set and fails with `CatchupTimeout`.
//!
//! Reads on the default domain carry no shard key and may touch any shard,
//! so a write on any domain of the context counts as outstanding for them.
//!
//! Replica-class reads fall back to the primary once when no replica is
//! reachable, if `replica_fallback` is enabled.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cluster::{Endpoint, Projection, Statement, StatementResult, Topology};
use crate::consistency::{
    ConsistencyContext, Domain, ReadResolution, ReplicationPosition, DEFAULT_DOMAIN,
};
use crate::error::{AccessError, AccessResult};
use crate::filter::{Filter, OrderKey};
use crate::model::{Entry, EntryId, ShardKey, Value};
use crate::observability::Event;

use super::config::RouterConfig;
use super::target::ReadTarget;

/// Chooses primary or replica endpoints for operations
pub struct ConnectionRouter {
    topology: Arc<dyn Topology>,
    config: RouterConfig,
    default_domain: Domain,
}

impl ConnectionRouter {
    pub fn new(topology: Arc<dyn Topology>, config: RouterConfig) -> Self {
        Self {
            topology,
            config,
            default_domain: Domain::new(DEFAULT_DOMAIN),
        }
    }

    /// Sets the domain of operations without a shard key.
    pub fn with_default_domain(mut self, domain: Domain) -> Self {
        self.default_domain = domain;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn default_domain(&self) -> &Domain {
        &self.default_domain
    }

    /// Replication domain of a shard key; no shard means the default domain.
    pub fn domain_for(&self, shard: Option<&ShardKey>) -> Domain {
        shard
            .map(Domain::from)
            .unwrap_or_else(|| self.default_domain.clone())
    }

    /// Returns a connection for `target` on `domain`.
    ///
    /// Reads on the default domain span every shard, so they observe every
    /// outstanding write of the context.
    pub fn connection(
        &self,
        ctx: &ConsistencyContext,
        target: ReadTarget,
        domain: &Domain,
    ) -> AccessResult<Connection> {
        if target == ReadTarget::Primary {
            ctx.mark_written(domain);
            let endpoint = self.topology.primary()?;
            debug!(
                event = %Event::RoutePrimary,
                context = %ctx.id(),
                domain = %domain,
                "domain marked written"
            );
            return Ok(self.wrap(ctx, endpoint, ReadTarget::Primary, domain));
        }

        let resolution = if *domain == self.default_domain {
            ctx.resolve_all(target)
        } else {
            ctx.resolve(domain, target)
        };

        match (target, resolution) {
            (ReadTarget::Replica, ReadResolution::ForcedPrimary) => {
                debug!(
                    event = %Event::RouteForcedPrimary,
                    context = %ctx.id(),
                    domain = %domain,
                    "outstanding write, reading from primary"
                );
                let endpoint = self.topology.primary()?;
                Ok(self.wrap(ctx, endpoint, ReadTarget::Primary, domain))
            }
            (ReadTarget::Specific(index), resolution) => {
                if let ReadResolution::CatchUpRequired { pending } = resolution {
                    self.wait_for_catch_up(ctx, domain, &pending)?;
                }
                let picked = self.topology.endpoint(index);
                if index == 0 {
                    return Ok(self.wrap(ctx, picked?, target, domain));
                }
                self.replica_or_fallback(ctx, domain, target, picked)
            }
            _ => {
                let picked = self.topology.any_replica();
                self.replica_or_fallback(ctx, domain, target, picked)
            }
        }
    }

    /// False while the replicas lag beyond `max_replica_lag_ms`.
    ///
    /// Results read while this is false should not be cached by the caller.
    pub fn allow_cache(&self, domain: &Domain) -> bool {
        match self.topology.replica_lag() {
            Some(lag) if lag > self.config.max_replica_lag() => {
                debug!(
                    event = %Event::CacheDisallowed,
                    domain = %domain,
                    lag_ms = lag.as_millis() as u64,
                    "replica lag above threshold"
                );
                false
            }
            _ => true,
        }
    }

    fn replica_or_fallback(
        &self,
        ctx: &ConsistencyContext,
        domain: &Domain,
        target: ReadTarget,
        picked: AccessResult<Arc<dyn Endpoint>>,
    ) -> AccessResult<Connection> {
        match picked {
            Ok(endpoint) => {
                debug!(
                    event = %Event::RouteReplica,
                    context = %ctx.id(),
                    domain = %domain,
                    endpoint = %endpoint.name(),
                    "replica read"
                );
                Ok(self.wrap(ctx, endpoint, target, domain))
            }
            Err(err @ AccessError::ConnectionUnavailable { .. }) if self.config.replica_fallback => {
                warn!(
                    event = %Event::ReplicaFallback,
                    context = %ctx.id(),
                    domain = %domain,
                    error = %err,
                    "no reachable replica, falling back to primary"
                );
                let endpoint = self.topology.primary()?;
                Ok(self.wrap(ctx, endpoint, ReadTarget::Primary, domain))
            }
            Err(err) => Err(err),
        }
    }

    fn wait_for_catch_up(
        &self,
        ctx: &ConsistencyContext,
        domain: &Domain,
        pending: &[(Domain, u64)],
    ) -> AccessResult<()> {
        let started = Instant::now();
        let attempts = self.config.catchup_attempts.max(1);

        for attempt in 1..=attempts {
            // Read after the generations were observed: a write racing this
            // wait bumps its generation and keeps the flag set.
            let position = self.topology.primary_position()?;
            debug!(
                event = %Event::CatchupWaitBegin,
                context = %ctx.id(),
                domain = %domain,
                position = %position,
                pending = pending.len(),
                attempt,
                "waiting for replicas"
            );

            let deadline = Instant::now() + self.config.catchup_timeout();
            if self.topology.wait_for(position, deadline)? {
                let cleared = pending
                    .iter()
                    .filter(|(written, generation)| ctx.clear_if_unchanged(written, *generation))
                    .count();
                info!(
                    event = %Event::CatchupWaitComplete,
                    context = %ctx.id(),
                    domain = %domain,
                    position = %position,
                    cleared,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "replicas caught up"
                );
                return Ok(());
            }

            warn!(
                event = %Event::CatchupAttemptTimeout,
                context = %ctx.id(),
                domain = %domain,
                position = %position,
                attempt,
                "catch-up attempt timed out"
            );
            if attempt < attempts {
                thread::sleep(self.config.catchup_backoff() * attempt);
            }
        }

        let waited = started.elapsed();
        warn!(
            event = %Event::CatchupTimeout,
            context = %ctx.id(),
            domain = %domain,
            waited_ms = waited.as_millis() as u64,
            "replicas did not catch up, domain stays on primary"
        );
        Err(AccessError::CatchupTimeout {
            domain: domain.to_string(),
            waited,
        })
    }

    fn wrap(
        &self,
        ctx: &ConsistencyContext,
        endpoint: Arc<dyn Endpoint>,
        served: ReadTarget,
        domain: &Domain,
    ) -> Connection {
        Connection {
            endpoint,
            served,
            domain: domain.clone(),
            ctx: ctx.clone(),
            timeout: self.config.statement_timeout(),
        }
    }
}

/// A routed handle onto one endpoint.
///
/// Every statement runs under the configured statement deadline. A write
/// that succeeds re-marks the domain in the owning context, so a catch-up
/// wait that ran between routing and commit cannot leave it clean.
pub struct Connection {
    endpoint: Arc<dyn Endpoint>,
    served: ReadTarget,
    domain: Domain,
    ctx: ConsistencyContext,
    timeout: Duration,
}

impl Connection {
    /// Name of the endpoint behind this connection.
    pub fn endpoint_name(&self) -> String {
        self.endpoint.name()
    }

    /// The target that actually serves this connection.
    pub fn served_by(&self) -> ReadTarget {
        self.served
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn execute(&self, statement: &Statement) -> AccessResult<StatementResult> {
        let deadline = Instant::now() + self.timeout;
        let result = self.endpoint.execute(statement, deadline)?;
        if statement.is_write() {
            self.ctx.mark_written(&self.domain);
        }
        Ok(result)
    }

    pub fn select(
        &self,
        filter: Filter,
        order: Vec<OrderKey>,
        limit: Option<usize>,
        projection: Projection,
    ) -> AccessResult<Vec<Entry>> {
        let statement = Statement::Select {
            filter,
            order,
            limit,
            projection,
        };
        match self.execute(&statement)? {
            StatementResult::Rows(rows) => Ok(rows),
            other => Err(self.unexpected(&statement, &other)),
        }
    }

    pub fn count(&self, filter: Filter) -> AccessResult<u64> {
        let statement = Statement::Count { filter };
        match self.execute(&statement)? {
            StatementResult::Count(count) => Ok(count),
            other => Err(self.unexpected(&statement, &other)),
        }
    }

    /// Inserts a row. Returns the assigned id and the change position.
    pub fn insert(&self, entry: Entry) -> AccessResult<(EntryId, ReplicationPosition)> {
        let statement = Statement::Insert { entry };
        match self.execute(&statement)? {
            StatementResult::Inserted { id, position } => Ok((id, position)),
            other => Err(self.unexpected(&statement, &other)),
        }
    }

    /// Replaces the fields of the row keyed by (id, shard). Returns rows affected.
    pub fn update(
        &self,
        id: EntryId,
        shard: ShardKey,
        fields: BTreeMap<String, Value>,
    ) -> AccessResult<u64> {
        let statement = Statement::Update { id, shard, fields };
        match self.execute(&statement)? {
            StatementResult::Affected { rows, .. } => Ok(rows),
            other => Err(self.unexpected(&statement, &other)),
        }
    }

    /// Deletes the row keyed by (id, shard). Returns rows affected.
    pub fn delete(&self, id: EntryId, shard: ShardKey) -> AccessResult<u64> {
        let statement = Statement::Delete { id, shard };
        match self.execute(&statement)? {
            StatementResult::Affected { rows, .. } => Ok(rows),
            other => Err(self.unexpected(&statement, &other)),
        }
    }

    fn unexpected(&self, statement: &Statement, result: &StatementResult) -> AccessError {
        AccessError::unavailable(
            self.endpoint.name(),
            format!("unexpected result for {}: {:?}", statement.kind(), result),
        )
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint.name())
            .field("served", &self.served)
            .field("domain", &self.domain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;

    fn setup(replicas: usize) -> (MemoryCluster, ConnectionRouter) {
        let cluster = MemoryCluster::new(replicas);
        let config = RouterConfig {
            catchup_timeout_ms: 20,
            catchup_backoff_ms: 1,
            ..Default::default()
        };
        let router = ConnectionRouter::new(Arc::new(cluster.clone()), config);
        (cluster, router)
    }

    #[test]
    fn test_clean_domain_reads_from_replica() {
        let (_cluster, router) = setup(2);
        let ctx = ConsistencyContext::new();
        let conn = router
            .connection(&ctx, ReadTarget::Replica, &Domain::from("wiki7"))
            .unwrap();

        assert_eq!(conn.served_by(), ReadTarget::Replica);
        assert!(conn.endpoint_name().starts_with("replica"));
    }

    #[test]
    fn test_primary_marks_written_and_forces_replica_reads() {
        let (_cluster, router) = setup(2);
        let ctx = ConsistencyContext::new();
        let domain = Domain::from("wiki7");

        router.connection(&ctx, ReadTarget::Primary, &domain).unwrap();
        assert!(ctx.is_written(&domain));

        for _ in 0..3 {
            let conn = router.connection(&ctx, ReadTarget::Replica, &domain).unwrap();
            assert_eq!(conn.served_by(), ReadTarget::Primary);
        }
        assert!(ctx.is_written(&domain));
    }

    #[test]
    fn test_other_domain_is_unaffected() {
        let (_cluster, router) = setup(1);
        let ctx = ConsistencyContext::new();
        router
            .connection(&ctx, ReadTarget::Primary, &Domain::from("a"))
            .unwrap();

        let conn = router
            .connection(&ctx, ReadTarget::Replica, &Domain::from("b"))
            .unwrap();
        assert_eq!(conn.served_by(), ReadTarget::Replica);
    }

    #[test]
    fn test_specific_waits_then_clears() {
        let (cluster, router) = setup(2);
        cluster.set_catch_up_on_wait(true);
        let ctx = ConsistencyContext::new();
        let domain = Domain::from("wiki7");

        let conn = router.connection(&ctx, ReadTarget::Primary, &domain).unwrap();
        conn.insert(Entry::new("wiki7").with_field("score", 1)).unwrap();

        let conn = router
            .connection(&ctx, ReadTarget::Specific(2), &domain)
            .unwrap();
        assert_eq!(conn.served_by(), ReadTarget::Specific(2));
        assert!(!ctx.is_written(&domain));

        let conn = router.connection(&ctx, ReadTarget::Replica, &domain).unwrap();
        assert_eq!(conn.served_by(), ReadTarget::Replica);
    }

    #[test]
    fn test_write_after_catch_up_re_marks_domain() {
        let (cluster, router) = setup(1);
        cluster.set_catch_up_on_wait(true);
        let ctx = ConsistencyContext::new();
        let domain = Domain::from("wiki7");

        let writer = router.connection(&ctx, ReadTarget::Primary, &domain).unwrap();
        // catch-up completes between routing the write and committing it
        router
            .connection(&ctx, ReadTarget::Specific(1), &domain)
            .unwrap();
        assert!(!ctx.is_written(&domain));

        writer.insert(Entry::new("wiki7")).unwrap();
        assert!(ctx.is_written(&domain));
        let conn = router.connection(&ctx, ReadTarget::Replica, &domain).unwrap();
        assert_eq!(conn.served_by(), ReadTarget::Primary);
    }

    #[test]
    fn test_failed_write_does_not_re_mark() {
        let (cluster, router) = setup(1);
        cluster.set_catch_up_on_wait(true);
        let ctx = ConsistencyContext::new();
        let domain = Domain::from("wiki7");

        let writer = router.connection(&ctx, ReadTarget::Primary, &domain).unwrap();
        router
            .connection(&ctx, ReadTarget::Specific(1), &domain)
            .unwrap();
        cluster.set_reachable(0, false);

        assert!(writer.insert(Entry::new("wiki7")).is_err());
        assert!(!ctx.is_written(&domain));
    }

    #[test]
    fn test_default_domain_observes_every_write() {
        let (cluster, router) = setup(1);
        let router = router.with_default_domain(Domain::from("enwiki"));
        let ctx = ConsistencyContext::new();
        let shard = Domain::from("wiki7");
        router.connection(&ctx, ReadTarget::Primary, &shard).unwrap();

        let unscoped = router.domain_for(None);
        assert_eq!(unscoped, Domain::from("enwiki"));
        let conn = router.connection(&ctx, ReadTarget::Replica, &unscoped).unwrap();
        assert_eq!(conn.served_by(), ReadTarget::Primary);

        // a specific-endpoint read on the default domain clears every domain it waited for
        cluster.set_catch_up_on_wait(true);
        router
            .connection(&ctx, ReadTarget::Specific(1), &unscoped)
            .unwrap();
        assert!(!ctx.any_written());
    }

    #[test]
    fn test_catch_up_timeout_keeps_flag() {
        let (_cluster, router) = setup(1);
        let ctx = ConsistencyContext::new();
        let domain = Domain::from("wiki7");

        let conn = router.connection(&ctx, ReadTarget::Primary, &domain).unwrap();
        conn.insert(Entry::new("wiki7")).unwrap();

        let err = router
            .connection(&ctx, ReadTarget::Specific(1), &domain)
            .unwrap_err();
        assert_eq!(err.code(), "REPLI_CATCHUP_TIMEOUT");
        assert!(err.is_transient());
        assert!(ctx.is_written(&domain));
    }

    #[test]
    fn test_replica_fallback_to_primary() {
        let (cluster, router) = setup(1);
        cluster.set_reachable(1, false);
        let ctx = ConsistencyContext::new();

        let conn = router
            .connection(&ctx, ReadTarget::Replica, &Domain::from("wiki7"))
            .unwrap();
        assert_eq!(conn.served_by(), ReadTarget::Primary);
        assert!(!ctx.is_written(&Domain::from("wiki7")));
    }

    #[test]
    fn test_replica_unavailable_without_fallback() {
        let cluster = MemoryCluster::new(1);
        cluster.set_reachable(1, false);
        let config = RouterConfig {
            replica_fallback: false,
            ..Default::default()
        };
        let router = ConnectionRouter::new(Arc::new(cluster), config);

        let err = router
            .connection(&ConsistencyContext::new(), ReadTarget::Replica, &Domain::from("a"))
            .unwrap_err();
        assert_eq!(err.code(), "REPLI_CONNECTION_UNAVAILABLE");
    }

    #[test]
    fn test_primary_unavailable_is_not_retried() {
        let (cluster, router) = setup(1);
        cluster.set_reachable(0, false);

        let err = router
            .connection(&ConsistencyContext::new(), ReadTarget::Primary, &Domain::from("a"))
            .unwrap_err();
        assert_eq!(err.code(), "REPLI_CONNECTION_UNAVAILABLE");
    }

    #[test]
    fn test_allow_cache_follows_lag() {
        let (cluster, router) = setup(1);
        let domain = Domain::from("wiki7");
        assert!(router.allow_cache(&domain));

        cluster.set_lag(Some(Duration::from_secs(60)));
        assert!(!router.allow_cache(&domain));

        cluster.set_lag(Some(Duration::from_millis(10)));
        assert!(router.allow_cache(&domain));
    }

    #[test]
    fn test_typed_statements_round_through_primary() {
        let (_cluster, router) = setup(0);
        let ctx = ConsistencyContext::new();
        let domain = Domain::from("wiki7");
        let conn = router.connection(&ctx, ReadTarget::Primary, &domain).unwrap();

        let (id, _) = conn.insert(Entry::new("wiki7").with_field("score", 3)).unwrap();
        assert_eq!(conn.count(Filter::All).unwrap(), 1);
        assert_eq!(conn.delete(id, ShardKey::from("wiki7")).unwrap(), 1);
        assert_eq!(conn.delete(id, ShardKey::from("wiki7")).unwrap(), 0);
    }
}
