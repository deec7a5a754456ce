//! In-process primary/replica cluster
//!
//! The primary applies writes immediately and appends them to a change log.
//! Replicas apply the log only when told to (`replicate_all`,
//! `replicate_replica`), or on a catch-up wait when `set_catch_up_on_wait`
//! is enabled, so replica lag is observable and deterministic in tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::consistency::ReplicationPosition;
use crate::error::{AccessError, AccessResult};
use crate::filter::{EntrySorter, Filter, FilterEvaluator, OrderKey};
use crate::model::{Entry, EntryId, ShardKey};

use super::endpoint::{Endpoint, Topology};
use super::statement::{Projection, Statement, StatementResult};

#[derive(Debug)]
struct Table {
    rows: BTreeMap<EntryId, Entry>,
    applied: ReplicationPosition,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            applied: ReplicationPosition::genesis(),
        }
    }
}

#[derive(Debug, Clone)]
enum ChangeOp {
    Upsert(Entry),
    Delete(EntryId),
}

#[derive(Debug, Clone)]
struct Change {
    op: ChangeOp,
    logged_at: Instant,
}

impl Table {
    fn apply(&mut self, op: &ChangeOp) {
        match op {
            ChangeOp::Upsert(entry) => {
                if let Some(id) = entry.id {
                    self.rows.insert(id, entry.clone());
                }
            }
            ChangeOp::Delete(id) => {
                self.rows.remove(id);
            }
        }
    }

    fn keyed(&self, id: EntryId, shard: &ShardKey) -> Option<&Entry> {
        self.rows.get(&id).filter(|e| &e.shard == shard)
    }

    fn select(
        &self,
        filter: &Filter,
        order: &[OrderKey],
        limit: Option<usize>,
        projection: &Projection,
    ) -> Vec<Entry> {
        let mut rows: Vec<Entry> = self
            .rows
            .values()
            .filter(|e| FilterEvaluator::matches(e, filter))
            .cloned()
            .collect();

        EntrySorter::sort(&mut rows, order);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        if let Projection::Fields(fields) = projection {
            for row in &mut rows {
                row.fields.retain(|name, _| fields.iter().any(|f| f == name));
            }
        }
        rows
    }
}

#[derive(Debug)]
struct ClusterState {
    primary: Table,
    replicas: Vec<Table>,
    log: Vec<Change>,
    next_id: u64,
    /// Index 0 is the primary
    reachable: Vec<bool>,
    catch_up_on_wait: bool,
    lag_override: Option<Duration>,
}

impl ClusterState {
    fn head(&self) -> ReplicationPosition {
        ReplicationPosition::new(self.log.len() as u64)
    }

    fn table(&self, slot: usize) -> &Table {
        if slot == 0 {
            &self.primary
        } else {
            &self.replicas[slot - 1]
        }
    }

    fn replicate(&mut self, replica: usize, target: ReplicationPosition) {
        let target = target.min(self.head());
        let log = &self.log;
        let table = &mut self.replicas[replica];
        while table.applied < target {
            let change = &log[table.applied.value() as usize];
            table.apply(&change.op);
            table.applied = table.applied.next();
        }
    }

    fn append(&mut self, op: ChangeOp) -> ReplicationPosition {
        self.primary.apply(&op);
        self.log.push(Change {
            op,
            logged_at: Instant::now(),
        });
        let head = self.head();
        self.primary.applied = head;
        head
    }

    fn replicas_caught_up(&self, position: ReplicationPosition) -> bool {
        self.replicas
            .iter()
            .enumerate()
            .filter(|(i, _)| self.reachable[i + 1])
            .all(|(_, t)| t.applied >= position)
    }

    fn write(&mut self, statement: &Statement) -> AccessResult<StatementResult> {
        match statement {
            Statement::Insert { entry } => {
                let id = match entry.id {
                    Some(id) if self.primary.rows.contains_key(&id) => {
                        return Err(AccessError::constraint(format!(
                            "duplicate entry id {}",
                            id
                        )));
                    }
                    Some(id) => id,
                    None => EntryId::new(self.next_id),
                };
                self.next_id = self.next_id.max(id.value() + 1);

                let mut row = entry.clone();
                row.id = Some(id);
                let position = self.append(ChangeOp::Upsert(row));
                Ok(StatementResult::Inserted { id, position })
            }
            Statement::Update { id, shard, fields } => {
                let row = match self.primary.keyed(*id, shard) {
                    Some(existing) => Entry {
                        fields: fields.clone(),
                        ..existing.clone()
                    },
                    None => {
                        return Ok(StatementResult::Affected {
                            rows: 0,
                            position: self.head(),
                        })
                    }
                };
                let position = self.append(ChangeOp::Upsert(row));
                Ok(StatementResult::Affected { rows: 1, position })
            }
            Statement::Delete { id, shard } => {
                if self.primary.keyed(*id, shard).is_none() {
                    return Ok(StatementResult::Affected {
                        rows: 0,
                        position: self.head(),
                    });
                }
                let position = self.append(ChangeOp::Delete(*id));
                Ok(StatementResult::Affected { rows: 1, position })
            }
            read => Err(AccessError::unavailable(
                "primary",
                format!("{} is not a write statement", read.kind()),
            )),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ClusterState>,
    replicated: Condvar,
}

/// In-memory cluster with manually driven replication
#[derive(Debug, Clone)]
pub struct MemoryCluster {
    shared: Arc<Shared>,
}

impl MemoryCluster {
    /// Creates a cluster with one primary and `replicas` replicas.
    pub fn new(replicas: usize) -> Self {
        let state = ClusterState {
            primary: Table::default(),
            replicas: (0..replicas).map(|_| Table::default()).collect(),
            log: Vec::new(),
            next_id: 1,
            reachable: vec![true; replicas + 1],
            catch_up_on_wait: false,
            lag_override: None,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                replicated: Condvar::new(),
            }),
        }
    }

    /// When enabled, a catch-up wait replicates the awaited changes itself,
    /// simulating replicas that keep streaming in the background.
    pub fn set_catch_up_on_wait(&self, enabled: bool) {
        self.shared.state.lock().catch_up_on_wait = enabled;
    }

    /// Marks an endpoint (0 = primary) reachable or not.
    pub fn set_reachable(&self, index: usize, reachable: bool) {
        let mut state = self.shared.state.lock();
        if let Some(flag) = state.reachable.get_mut(index) {
            *flag = reachable;
        }
        drop(state);
        self.shared.replicated.notify_all();
    }

    /// Overrides the reported replica lag.
    pub fn set_lag(&self, lag: Option<Duration>) {
        self.shared.state.lock().lag_override = lag;
    }

    /// Applies the whole change log on every replica.
    pub fn replicate_all(&self) {
        let mut state = self.shared.state.lock();
        let head = state.head();
        for replica in 0..state.replicas.len() {
            state.replicate(replica, head);
        }
        drop(state);
        self.shared.replicated.notify_all();
    }

    /// Applies the change log up to `position` on one replica (1-based index).
    pub fn replicate_replica(&self, index: usize, position: ReplicationPosition) {
        let mut state = self.shared.state.lock();
        if index == 0 || index > state.replicas.len() {
            return;
        }
        state.replicate(index - 1, position);
        drop(state);
        self.shared.replicated.notify_all();
    }

    /// Applied position of an endpoint (0 = primary).
    pub fn applied_position(&self, index: usize) -> Option<ReplicationPosition> {
        let state = self.shared.state.lock();
        if index > state.replicas.len() {
            return None;
        }
        Some(state.table(index).applied)
    }

    /// Inserts rows on the primary and replicates them everywhere.
    pub fn seed(&self, entries: impl IntoIterator<Item = Entry>) -> AccessResult<Vec<EntryId>> {
        let mut ids = Vec::new();
        {
            let mut state = self.shared.state.lock();
            for entry in entries {
                if let StatementResult::Inserted { id, .. } =
                    state.write(&Statement::Insert { entry })?
                {
                    ids.push(id);
                }
            }
        }
        self.replicate_all();
        Ok(ids)
    }

    fn handle(&self, slot: usize) -> Arc<dyn Endpoint> {
        Arc::new(MemoryEndpoint {
            shared: Arc::clone(&self.shared),
            slot,
        })
    }

    fn check_reachable(&self, slot: usize) -> AccessResult<Arc<dyn Endpoint>> {
        if self.shared.state.lock().reachable[slot] {
            Ok(self.handle(slot))
        } else {
            Err(AccessError::unavailable(slot_name(slot), "endpoint unreachable"))
        }
    }
}

fn slot_name(slot: usize) -> String {
    if slot == 0 {
        "primary".to_string()
    } else {
        format!("replica-{}", slot)
    }
}

impl Topology for MemoryCluster {
    fn primary(&self) -> AccessResult<Arc<dyn Endpoint>> {
        self.check_reachable(0)
    }

    fn replica_count(&self) -> usize {
        self.shared.state.lock().replicas.len()
    }

    fn endpoint(&self, index: usize) -> AccessResult<Arc<dyn Endpoint>> {
        if index > self.replica_count() {
            return Err(AccessError::unavailable(
                slot_name(index),
                "no such endpoint",
            ));
        }
        self.check_reachable(index)
    }

    fn any_replica(&self) -> AccessResult<Arc<dyn Endpoint>> {
        let state = self.shared.state.lock();
        if state.replicas.is_empty() {
            drop(state);
            return self.check_reachable(0);
        }
        let slot = (1..=state.replicas.len()).find(|&slot| state.reachable[slot]);
        drop(state);
        match slot {
            Some(slot) => Ok(self.handle(slot)),
            None => Err(AccessError::unavailable("replica", "no reachable replica")),
        }
    }

    fn primary_position(&self) -> AccessResult<ReplicationPosition> {
        let state = self.shared.state.lock();
        if !state.reachable[0] {
            return Err(AccessError::unavailable("primary", "endpoint unreachable"));
        }
        Ok(state.head())
    }

    fn wait_for(&self, position: ReplicationPosition, deadline: Instant) -> AccessResult<bool> {
        let mut state = self.shared.state.lock();
        loop {
            if state.catch_up_on_wait {
                for replica in 0..state.replicas.len() {
                    if state.reachable[replica + 1] {
                        state.replicate(replica, position);
                    }
                }
            }
            if state.replicas_caught_up(position) {
                return Ok(true);
            }
            if self
                .shared
                .replicated
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(state.replicas_caught_up(position));
            }
        }
    }

    fn replica_lag(&self) -> Option<Duration> {
        let state = self.shared.state.lock();
        if state.replicas.is_empty() {
            return None;
        }
        if let Some(lag) = state.lag_override {
            return Some(lag);
        }
        let now = Instant::now();
        let lag = state
            .replicas
            .iter()
            .enumerate()
            .filter(|(i, _)| state.reachable[i + 1])
            .filter_map(|(_, t)| state.log.get(t.applied.value() as usize))
            .map(|oldest_unapplied| now.duration_since(oldest_unapplied.logged_at))
            .max()
            .unwrap_or(Duration::ZERO);
        Some(lag)
    }
}

/// Connection handle onto one slot of a `MemoryCluster`
#[derive(Debug)]
pub struct MemoryEndpoint {
    shared: Arc<Shared>,
    slot: usize,
}

impl Endpoint for MemoryEndpoint {
    fn name(&self) -> String {
        slot_name(self.slot)
    }

    fn execute(&self, statement: &Statement, deadline: Instant) -> AccessResult<StatementResult> {
        if Instant::now() >= deadline {
            return Err(AccessError::unavailable(self.name(), "deadline exceeded"));
        }

        let mut state = self.shared.state.lock();
        if !state.reachable[self.slot] {
            return Err(AccessError::unavailable(self.name(), "endpoint unreachable"));
        }

        match statement {
            Statement::Select {
                filter,
                order,
                limit,
                projection,
            } => Ok(StatementResult::Rows(
                state.table(self.slot).select(filter, order, *limit, projection),
            )),
            Statement::Count { filter } => {
                let count = state
                    .table(self.slot)
                    .rows
                    .values()
                    .filter(|e| FilterEvaluator::matches(e, filter))
                    .count();
                Ok(StatementResult::Count(count as u64))
            }
            _ if self.slot != 0 => Err(AccessError::unavailable(
                self.name(),
                "endpoint is read-only",
            )),
            write => state.write(write),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Column, Predicate};
    use crate::model::Value;

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn select_all() -> Statement {
        Statement::Select {
            filter: Filter::All,
            order: Vec::new(),
            limit: None,
            projection: Projection::All,
        }
    }

    fn rows(endpoint: &Arc<dyn Endpoint>) -> Vec<Entry> {
        match endpoint.execute(&select_all(), far()).unwrap() {
            StatementResult::Rows(rows) => rows,
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let cluster = MemoryCluster::new(1);
        let primary = cluster.primary().unwrap();

        let first = primary
            .execute(&Statement::Insert { entry: Entry::new("a") }, far())
            .unwrap();
        let second = primary
            .execute(&Statement::Insert { entry: Entry::new("b") }, far())
            .unwrap();

        assert_eq!(
            first,
            StatementResult::Inserted {
                id: EntryId::new(1),
                position: ReplicationPosition::new(1)
            }
        );
        assert_eq!(
            second,
            StatementResult::Inserted {
                id: EntryId::new(2),
                position: ReplicationPosition::new(2)
            }
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let cluster = MemoryCluster::new(0);
        let primary = cluster.primary().unwrap();
        let entry = Entry::new("a").with_id(EntryId::new(9));

        primary
            .execute(&Statement::Insert { entry: entry.clone() }, far())
            .unwrap();
        let err = primary
            .execute(&Statement::Insert { entry }, far())
            .unwrap_err();

        assert_eq!(err.code(), "REPLI_CONSTRAINT_VIOLATION");
    }

    #[test]
    fn test_replica_lags_until_replicated() {
        let cluster = MemoryCluster::new(1);
        cluster.primary().unwrap()
            .execute(&Statement::Insert { entry: Entry::new("a") }, far())
            .unwrap();

        let replica = cluster.any_replica().unwrap();
        assert!(rows(&replica).is_empty());

        cluster.replicate_all();
        assert_eq!(rows(&replica).len(), 1);
    }

    #[test]
    fn test_replica_rejects_writes() {
        let cluster = MemoryCluster::new(1);
        let replica = cluster.endpoint(1).unwrap();
        let err = replica
            .execute(&Statement::Insert { entry: Entry::new("a") }, far())
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_update_and_delete_are_keyed_by_shard() {
        let cluster = MemoryCluster::new(0);
        let ids = cluster.seed(vec![Entry::new("a").with_field("x", 1)]).unwrap();
        let primary = cluster.primary().unwrap();

        let wrong_shard = Statement::Delete {
            id: ids[0],
            shard: ShardKey::from("b"),
        };
        match primary.execute(&wrong_shard, far()).unwrap() {
            StatementResult::Affected { rows, .. } => assert_eq!(rows, 0),
            other => panic!("unexpected {:?}", other),
        }

        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), Value::Int(2));
        let update = Statement::Update {
            id: ids[0],
            shard: ShardKey::from("a"),
            fields,
        };
        match primary.execute(&update, far()).unwrap() {
            StatementResult::Affected { rows, .. } => assert_eq!(rows, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rows(&primary)[0].get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_select_filters_orders_and_projects() {
        let cluster = MemoryCluster::new(0);
        cluster
            .seed(vec![
                Entry::new("a").with_field("score", 3).with_field("note", "x"),
                Entry::new("a").with_field("score", 9).with_field("note", "y"),
                Entry::new("b").with_field("score", 5).with_field("note", "z"),
            ])
            .unwrap();

        let stmt = Statement::Select {
            filter: Predicate::eq(Column::Shard, "a").into(),
            order: vec![OrderKey::new(
                Column::Field("score".into()),
                crate::filter::SortDirection::Desc,
            )],
            limit: Some(1),
            projection: Projection::Fields(vec!["score".into()]),
        };
        let result = cluster.primary().unwrap().execute(&stmt, far()).unwrap();
        match result {
            StatementResult::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("score"), Some(&Value::Int(9)));
                assert_eq!(rows[0].get("note"), None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wait_for_times_out_without_replication() {
        let cluster = MemoryCluster::new(1);
        cluster.primary().unwrap()
            .execute(&Statement::Insert { entry: Entry::new("a") }, far())
            .unwrap();

        let deadline = Instant::now() + Duration::from_millis(20);
        let caught_up = cluster.wait_for(ReplicationPosition::new(1), deadline).unwrap();
        assert!(!caught_up);
    }

    #[test]
    fn test_wait_for_wakes_on_replication() {
        let cluster = MemoryCluster::new(1);
        cluster.primary().unwrap()
            .execute(&Statement::Insert { entry: Entry::new("a") }, far())
            .unwrap();

        let background = cluster.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            background.replicate_all();
        });

        let caught_up = cluster.wait_for(ReplicationPosition::new(1), far()).unwrap();
        handle.join().unwrap();
        assert!(caught_up);
    }

    #[test]
    fn test_catch_up_on_wait() {
        let cluster = MemoryCluster::new(2);
        cluster.set_catch_up_on_wait(true);
        cluster.primary().unwrap()
            .execute(&Statement::Insert { entry: Entry::new("a") }, far())
            .unwrap();

        assert!(cluster.wait_for(ReplicationPosition::new(1), far()).unwrap());
        assert_eq!(cluster.applied_position(2), Some(ReplicationPosition::new(1)));
    }

    #[test]
    fn test_unreachable_endpoints() {
        let cluster = MemoryCluster::new(1);
        cluster.set_reachable(1, false);
        assert!(cluster.any_replica().is_err());

        cluster.set_reachable(0, false);
        assert!(cluster.primary().is_err());
        assert!(cluster.primary_position().is_err());
    }

    #[test]
    fn test_replica_lag_reporting() {
        let cluster = MemoryCluster::new(1);
        assert_eq!(cluster.replica_lag(), Some(Duration::ZERO));

        cluster.set_lag(Some(Duration::from_secs(30)));
        assert_eq!(cluster.replica_lag(), Some(Duration::from_secs(30)));

        assert_eq!(MemoryCluster::new(0).replica_lag(), None);
    }
}
