//! Read-Your-Writes Tests
//!
//! Consistency routing across a lagging replica set:
//! - Writes mark their domain; replica reads on it are served by the primary
//! - A successful catch-up wait returns the domain to the replicas
//! - A timed-out wait keeps the domain on the primary
//! - Contexts do not leak writes into each other
//! - Unreachable replicas fall back to the primary

use std::sync::Arc;
use std::time::Duration;

use replistore::cluster::MemoryCluster;
use replistore::consistency::ReadResolution;
use replistore::model::{Entry, EntryId, ShardKey, Value};
use replistore::query::ListRequest;
use replistore::router::{ReadTarget, RouterConfig};
use replistore::{AccessConfig, AccessLayer, Domain};

fn config() -> AccessConfig {
    let mut config = AccessConfig::from_json_str(
        r#"{
            "table": { "fields": ["score", "hidden"] },
            "sorts": { "score": "score" },
            "lists": {
                "visible": {
                    "conditions": [{ "field": "hidden", "op": "eq", "value": false }],
                    "sort": "score",
                    "direction": "desc"
                }
            }
        }"#,
    )
    .unwrap();
    config.router = RouterConfig {
        catchup_timeout_ms: 30,
        catchup_attempts: 2,
        catchup_backoff_ms: 1,
        ..RouterConfig::default()
    };
    config
}

fn setup(replicas: usize) -> (MemoryCluster, AccessLayer) {
    let cluster = MemoryCluster::new(replicas);
    let layer = AccessLayer::new(&config(), Arc::new(cluster.clone())).unwrap();
    (cluster, layer)
}

fn wiki7() -> ShardKey {
    ShardKey::from("wiki7")
}

// =============================================================================
// Writes Then Reads
// =============================================================================

/// Insert on wiki7, then an immediate replica-targeted Get sees the row
/// although no replica has applied it.
#[test]
fn test_insert_then_replica_get() {
    let (cluster, layer) = setup(2);
    let ctx = layer.context();

    let id = layer
        .store()
        .insert(&ctx, Entry::new("wiki7").with_field("score", 3))
        .unwrap();
    assert!(cluster.applied_position(1).unwrap() < cluster.applied_position(0).unwrap());

    let rows = layer.store().get(&ctx, Some(id), Some(&wiki7())).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, Some(id));
}

/// The same read from a fresh context goes to the lagging replica.
#[test]
fn test_other_context_sees_replica_state() {
    let (_cluster, layer) = setup(1);
    let writer = layer.context();

    let id = layer
        .store()
        .insert(&writer, Entry::new("wiki7").with_field("score", 3))
        .unwrap();

    let reader = layer.context();
    assert!(layer.store().get(&reader, Some(id), Some(&wiki7())).unwrap().is_empty());
}

/// Updates and deletes are visible to list pages in the same context.
#[test]
fn test_list_observes_update_and_delete() {
    let (cluster, layer) = setup(1);
    let ids = cluster
        .seed((1..=3).map(|s| {
            Entry::new("wiki7")
                .with_field("score", s)
                .with_field("hidden", false)
        }))
        .unwrap();
    let ctx = layer.context();

    let hide = Entry::new("wiki7")
        .with_id(ids[2])
        .with_field("score", 3)
        .with_field("hidden", true);
    layer.store().update(&ctx, &hide).unwrap();
    layer
        .store()
        .delete(&ctx, &Entry::new("wiki7").with_id(ids[0]))
        .unwrap();

    let page = layer
        .lists()
        .query(&ctx, &ListRequest::new("visible", 10).in_shard("wiki7"))
        .unwrap();
    let visible: Vec<EntryId> = page.entries.iter().filter_map(|e| e.id).collect();
    assert_eq!(visible, vec![ids[1]]);
}

/// Condition re-evaluation after a write reads the new values.
#[test]
fn test_evaluate_conditions_after_update() {
    let (cluster, layer) = setup(1);
    let ids = cluster
        .seed([Entry::new("wiki7")
            .with_field("score", 1)
            .with_field("hidden", false)])
        .unwrap();
    let ctx = layer.context();

    let changed = Entry::new("wiki7")
        .with_id(ids[0])
        .with_field("score", 8)
        .with_field("hidden", true);
    layer.store().update(&ctx, &changed).unwrap();

    let values = layer.store().evaluate_conditions(&ctx, &changed).unwrap();
    assert_eq!(values.get("hidden"), Some(&Value::Bool(true)));
    assert_eq!(values.get("score"), Some(&Value::Int(8)));
    assert!(layer.store().lists_containing(&ctx, &changed).unwrap().is_empty());
}

// =============================================================================
// Tracker Convergence
// =============================================================================

/// After a successful catch-up wait, replica reads go back to the replicas.
#[test]
fn test_catch_up_returns_domain_to_replicas() {
    let (cluster, layer) = setup(2);
    let ctx = layer.context();
    let domain = Domain::from("wiki7");

    layer
        .store()
        .insert(&ctx, Entry::new("wiki7").with_field("score", 1))
        .unwrap();
    let forced = layer
        .router()
        .connection(&ctx, ReadTarget::Replica, &domain)
        .unwrap();
    assert_eq!(forced.served_by(), ReadTarget::Primary);

    // replicas keep streaming while the router waits
    cluster.set_catch_up_on_wait(true);
    let specific = layer
        .router()
        .connection(&ctx, ReadTarget::Specific(1), &domain)
        .unwrap();

    assert_eq!(specific.served_by(), ReadTarget::Specific(1));
    assert!(!ctx.is_written(&domain));
    let replica = layer
        .router()
        .connection(&ctx, ReadTarget::Replica, &domain)
        .unwrap();
    assert_eq!(replica.served_by(), ReadTarget::Replica);
}

/// A timed-out wait fails transiently and keeps routing to the primary.
#[test]
fn test_catch_up_timeout_keeps_domain_on_primary() {
    let (_cluster, layer) = setup(1);
    let ctx = layer.context();
    let domain = Domain::from("wiki7");

    layer
        .store()
        .insert(&ctx, Entry::new("wiki7").with_field("score", 1))
        .unwrap();

    let err = layer
        .router()
        .connection(&ctx, ReadTarget::Specific(1), &domain)
        .unwrap_err();
    assert_eq!(err.code(), "REPLI_CATCHUP_TIMEOUT");
    assert!(err.is_transient());

    assert!(ctx.is_written(&domain));
    let conn = layer
        .router()
        .connection(&ctx, ReadTarget::Replica, &domain)
        .unwrap();
    assert_eq!(conn.served_by(), ReadTarget::Primary);
}

/// A write racing a catch-up wait is never cleared by it.
#[test]
fn test_racing_write_survives_catch_up() {
    let (_cluster, layer) = setup(1);
    let ctx = layer.context();
    let domain = Domain::from("wiki7");

    layer
        .store()
        .insert(&ctx, Entry::new("wiki7").with_field("score", 1))
        .unwrap();
    let generation = match ctx.resolve(&domain, ReadTarget::Specific(1)) {
        ReadResolution::CatchUpRequired { pending } => pending[0].1,
        other => panic!("expected catch-up, got {:?}", other),
    };

    // lands after the generation was observed but before the wait clears
    layer
        .store()
        .insert(&ctx, Entry::new("wiki7").with_field("score", 2))
        .unwrap();

    assert!(!ctx.clear_if_unchanged(&domain, generation));
    assert!(ctx.is_written(&domain));
}

/// A write committed after a catch-up wait cleared its domain still routes
/// later replica reads to the primary.
#[test]
fn test_write_committed_after_catch_up_is_visible() {
    let (cluster, layer) = setup(1);
    let ctx = layer.context();
    let domain = Domain::from("wiki7");

    let writer = layer
        .router()
        .connection(&ctx, ReadTarget::Primary, &domain)
        .unwrap();
    cluster.set_catch_up_on_wait(true);
    layer
        .router()
        .connection(&ctx, ReadTarget::Specific(1), &domain)
        .unwrap();
    cluster.set_catch_up_on_wait(false);

    let (id, _) = writer
        .insert(Entry::new("wiki7").with_field("score", 4))
        .unwrap();

    assert!(ctx.is_written(&domain));
    let rows = layer.store().get(&ctx, Some(id), Some(&wiki7())).unwrap();
    assert_eq!(rows.len(), 1);
}

// =============================================================================
// Reads Without a Shard Key
// =============================================================================

/// A get without a shard spans every shard, so it sees the write on wiki7.
#[test]
fn test_shardless_get_after_insert() {
    let (_cluster, layer) = setup(1);
    let ctx = layer.context();

    let id = layer
        .store()
        .insert(&ctx, Entry::new("wiki7").with_field("score", 3))
        .unwrap();

    let rows = layer.store().get(&ctx, Some(id), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].shard, wiki7());
}

#[test]
fn test_shardless_query_and_count_after_insert() {
    let (_cluster, layer) = setup(1);
    let ctx = layer.context();

    layer
        .store()
        .insert(
            &ctx,
            Entry::new("wiki7")
                .with_field("score", 3)
                .with_field("hidden", false),
        )
        .unwrap();

    let page = layer
        .lists()
        .query(&ctx, &ListRequest::new("visible", 10))
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(layer.lists().count(&ctx, "visible", None).unwrap(), 1);
}

/// Without any write in the context, shardless reads stay on the replicas.
#[test]
fn test_shardless_read_without_writes_uses_replica() {
    let (_cluster, layer) = setup(1);
    let ctx = layer.context();

    let conn = layer
        .router()
        .connection(&ctx, ReadTarget::Replica, &Domain::from("default"))
        .unwrap();
    assert_eq!(conn.served_by(), ReadTarget::Replica);
}

// =============================================================================
// Fallback and Cache Signal
// =============================================================================

/// With every replica down, reads still succeed through the primary.
#[test]
fn test_replica_outage_falls_back_to_primary() {
    let (cluster, layer) = setup(2);
    cluster
        .seed([Entry::new("wiki7")
            .with_field("score", 1)
            .with_field("hidden", false)])
        .unwrap();
    cluster.set_reachable(1, false);
    cluster.set_reachable(2, false);

    let ctx = layer.context();
    let page = layer
        .lists()
        .query(&ctx, &ListRequest::new("visible", 10))
        .unwrap();
    assert_eq!(page.len(), 1);
}

/// With the primary down, writes fail and are not retried elsewhere.
#[test]
fn test_primary_outage_fails_writes() {
    let (cluster, layer) = setup(1);
    cluster.set_reachable(0, false);

    let err = layer
        .store()
        .insert(&layer.context(), Entry::new("wiki7").with_field("score", 1))
        .unwrap_err();
    assert_eq!(err.code(), "REPLI_CONNECTION_UNAVAILABLE");
}

#[test]
fn test_allow_cache_tracks_replica_lag() {
    let (cluster, layer) = setup(1);
    assert!(layer.store().allow_cache(Some(&wiki7())));

    cluster.set_lag(Some(Duration::from_secs(30)));
    assert!(!layer.store().allow_cache(Some(&wiki7())));
    assert!(!layer.store().allow_cache(None));
}
