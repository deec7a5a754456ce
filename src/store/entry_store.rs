//! Entry CRUD surface
//!
//! Reads go through the replica path and writes through the primary path,
//! so a write always marks its domain and the next read on that domain in
//! the same context sees it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::cluster::Projection;
use crate::consistency::{ConsistencyContext, Domain};
use crate::error::{AccessError, AccessResult};
use crate::filter::{Column, Filter, OrderKey, Predicate, SortDirection};
use crate::lists::ConditionCompiler;
use crate::model::{Entry, EntryId, ShardKey, Value};
use crate::observability::Event;
use crate::router::{ConnectionRouter, ReadTarget};

/// CRUD and condition re-evaluation over entries
pub struct EntryStore {
    router: Arc<ConnectionRouter>,
    compiler: ConditionCompiler,
}

impl EntryStore {
    pub fn new(router: Arc<ConnectionRouter>, compiler: ConditionCompiler) -> Self {
        Self { router, compiler }
    }

    /// Entries matching an optional id and an optional shard key, by id.
    pub fn get(
        &self,
        ctx: &ConsistencyContext,
        id: Option<EntryId>,
        shard: Option<&ShardKey>,
    ) -> AccessResult<Vec<Entry>> {
        let mut filter = Filter::All;
        if let Some(id) = id {
            filter = filter.and(Predicate::eq(Column::Id, id).into());
        }
        if let Some(shard) = shard {
            filter = filter.and(Predicate::eq(Column::Shard, shard.as_str()).into());
        }

        let conn = self
            .router
            .connection(ctx, ReadTarget::Replica, &self.router.domain_for(shard))?;
        conn.select(
            filter,
            vec![OrderKey::new(Column::Id, SortDirection::Asc)],
            None,
            Projection::All,
        )
    }

    /// Inserts a new entry and returns its assigned identifier.
    pub fn insert(&self, ctx: &ConsistencyContext, entry: Entry) -> AccessResult<EntryId> {
        if entry.id.is_some() {
            return Err(AccessError::constraint(
                "insert must not carry an identifier",
            ));
        }
        self.check_fields(&entry.fields)?;

        let domain = Domain::from(&entry.shard);
        let conn = self.router.connection(ctx, ReadTarget::Primary, &domain)?;
        let (id, position) = conn.insert(entry)?;

        info!(
            event = %Event::WriteCommit,
            context = %ctx.id(),
            domain = %domain,
            op = "insert",
            id = %id,
            position = %position,
            "entry written"
        );
        Ok(id)
    }

    /// Replaces the fields of the entry keyed by (id, shard).
    pub fn update(&self, ctx: &ConsistencyContext, entry: &Entry) -> AccessResult<u64> {
        let id = keyed(entry, "update")?;
        self.check_fields(&entry.fields)?;

        let domain = Domain::from(&entry.shard);
        let conn = self.router.connection(ctx, ReadTarget::Primary, &domain)?;
        let rows = conn.update(id, entry.shard.clone(), entry.fields.clone())?;
        self.written(ctx, &domain, "update", id, entry, rows)
    }

    /// Deletes the entry keyed by (id, shard).
    pub fn delete(&self, ctx: &ConsistencyContext, entry: &Entry) -> AccessResult<u64> {
        let id = keyed(entry, "delete")?;

        let domain = Domain::from(&entry.shard);
        let conn = self.router.connection(ctx, ReadTarget::Primary, &domain)?;
        let rows = conn.delete(id, entry.shard.clone())?;
        self.written(ctx, &domain, "delete", id, entry, rows)
    }

    /// Re-reads exactly the fields every list condition and sort depends on.
    ///
    /// Missing fields come back as `Null`. Callers use the result to decide
    /// which list views an entry belongs to after a mutation.
    pub fn evaluate_conditions(
        &self,
        ctx: &ConsistencyContext,
        entry: &Entry,
    ) -> AccessResult<BTreeMap<String, Value>> {
        let names = self.compiler.all_conditions();
        let row = self.read_conditions(ctx, entry, &names)?;

        Ok(names
            .into_iter()
            .map(|name| {
                let value = self
                    .compiler
                    .column(&name)
                    .map(|column| column.read(&row))
                    .unwrap_or(Value::Null);
                (name, value)
            })
            .collect())
    }

    /// Names of the lists the stored entry currently belongs to.
    pub fn lists_containing(
        &self,
        ctx: &ConsistencyContext,
        entry: &Entry,
    ) -> AccessResult<Vec<String>> {
        let row = self.read_conditions(ctx, entry, &self.compiler.all_conditions())?;
        Ok(self.compiler.lists_matching(&row))
    }

    /// False while replica reads on `shard` should not be cached.
    pub fn allow_cache(&self, shard: Option<&ShardKey>) -> bool {
        self.router.allow_cache(&self.router.domain_for(shard))
    }

    fn read_conditions(
        &self,
        ctx: &ConsistencyContext,
        entry: &Entry,
        names: &BTreeSet<String>,
    ) -> AccessResult<Entry> {
        let id = keyed(entry, "evaluate")?;
        let fields = names
            .iter()
            .filter(|name| matches!(self.compiler.column(name), Some(Column::Field(_))))
            .cloned()
            .collect();
        let filter = Filter::all_of([
            Predicate::eq(Column::Id, id),
            Predicate::eq(Column::Shard, entry.shard.as_str()),
        ]);

        let conn = self
            .router
            .connection(ctx, ReadTarget::Replica, &Domain::from(&entry.shard))?;
        conn.select(filter, Vec::new(), Some(1), Projection::Fields(fields))?
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::NotFound {
                id,
                shard: entry.shard.clone(),
            })
    }

    fn check_fields(&self, fields: &BTreeMap<String, Value>) -> AccessResult<()> {
        let table = self.compiler.registry().table();
        match fields.keys().find(|name| !table.fields.contains(*name)) {
            Some(name) => Err(AccessError::constraint(format!(
                "undeclared field '{}'",
                name
            ))),
            None => Ok(()),
        }
    }

    fn written(
        &self,
        ctx: &ConsistencyContext,
        domain: &Domain,
        op: &'static str,
        id: EntryId,
        entry: &Entry,
        rows: u64,
    ) -> AccessResult<u64> {
        if rows == 0 {
            return Err(AccessError::NotFound {
                id,
                shard: entry.shard.clone(),
            });
        }
        info!(
            event = %Event::WriteCommit,
            context = %ctx.id(),
            domain = %domain,
            op,
            id = %id,
            rows,
            "entry written"
        );
        Ok(rows)
    }
}

fn keyed(entry: &Entry, op: &str) -> AccessResult<EntryId> {
    entry
        .id
        .ok_or_else(|| AccessError::constraint(format!("{} requires an identifier", op)))
}
