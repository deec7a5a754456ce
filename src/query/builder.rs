//! List query builder
//!
//! Planning is pure: it compiles the list, decodes the cursor and builds the
//! filter and ordering. Execution reads through the router's replica path.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cluster::Projection;
use crate::consistency::{ConsistencyContext, Domain};
use crate::cursor::{Cursor, CursorScope, OffsetCodec};
use crate::error::AccessResult;
use crate::filter::{Column, Filter, OrderKey, Predicate, SortDirection};
use crate::lists::{CompiledList, ConditionCompiler};
use crate::model::{Entry, ShardKey};
use crate::observability::Event;
use crate::router::{ConnectionRouter, ReadTarget};

use super::bound::PageOrder;
use super::request::{ListPage, ListRequest};

/// Where a page starts
#[derive(Debug, Clone, PartialEq)]
pub enum PageStart {
    /// First page
    Beginning,
    /// Strictly after a delivered row
    After(Cursor),
    /// Cursor produced for another list, sort or direction
    ForeignCursor(Cursor),
}

/// A fully resolved page query
#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    pub list: CompiledList,
    pub domain: Domain,
    pub paging: SortDirection,
    pub scope: CursorScope,
    pub start: PageStart,
    pub filter: Filter,
    pub order: Vec<OrderKey>,
    pub limit: usize,
}

impl ListPlan {
    /// True if executing the plan cannot return rows.
    pub fn is_empty(&self) -> bool {
        self.limit == 0 || matches!(self.start, PageStart::ForeignCursor(_))
    }
}

impl fmt::Display for ListPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "list:   {} (paging {})", self.list.name, self.paging)?;
        writeln!(f, "domain: {}", self.domain)?;
        writeln!(f, "filter: {}", self.filter)?;
        let order: Vec<String> = self.order.iter().map(|k| k.to_string()).collect();
        writeln!(f, "order:  {}", order.join(", "))?;
        write!(f, "limit:  {}", self.limit)?;
        if let PageStart::ForeignCursor(_) = self.start {
            write!(f, "\ncursor: belongs to another list, page is empty")?;
        }
        Ok(())
    }
}

/// Builds and runs cursor-paginated list queries
pub struct ListQueryBuilder {
    compiler: ConditionCompiler,
    router: Arc<ConnectionRouter>,
}

impl ListQueryBuilder {
    pub fn new(compiler: ConditionCompiler, router: Arc<ConnectionRouter>) -> Self {
        Self { compiler, router }
    }

    /// Resolves a request without touching any endpoint.
    pub fn plan(&self, request: &ListRequest) -> AccessResult<ListPlan> {
        let list = self
            .compiler
            .compile_with_sort(&request.list, request.sort.as_deref())?;
        let sort_column = list.sort_column().cloned();
        let order = PageOrder::new(list.direction, request.direction, sort_column.is_some());
        let scope = CursorScope::of(
            &list.name,
            list.sort.as_ref().map(|s| s.field.as_str()),
            request.direction,
        );

        let mut filter = shard_filter(list.predicate.clone(), request.shard.as_ref());

        let start = match &request.cursor {
            None => PageStart::Beginning,
            Some(token) => {
                let cursor = OffsetCodec::decode(token)?;
                let foreign_scope = cursor.scope.map_or(false, |s| s != scope);
                let foreign_shape = cursor.sort_value.is_some() != sort_column.is_some();
                if foreign_scope || foreign_shape {
                    PageStart::ForeignCursor(cursor)
                } else {
                    filter = filter.and(order.bound(sort_column.as_ref(), &cursor));
                    PageStart::After(cursor)
                }
            }
        };

        Ok(ListPlan {
            domain: self.router.domain_for(request.shard.as_ref()),
            paging: request.direction,
            scope,
            start,
            filter,
            order: order.keys(sort_column.as_ref()),
            limit: request.limit,
            list,
        })
    }

    /// Fetches one page.
    pub fn query(&self, ctx: &ConsistencyContext, request: &ListRequest) -> AccessResult<ListPage> {
        let plan = self.plan(request)?;

        if let PageStart::ForeignCursor(cursor) = &plan.start {
            warn!(
                event = %Event::CursorScopeMismatch,
                context = %ctx.id(),
                list = %plan.list.name,
                cursor_id = %cursor.id,
                "cursor belongs to another list or direction"
            );
        }
        if plan.is_empty() {
            return Ok(ListPage::empty());
        }

        let conn = self
            .router
            .connection(ctx, ReadTarget::Replica, &plan.domain)?;
        let entries = conn.select(
            plan.filter.clone(),
            plan.order.clone(),
            Some(plan.limit),
            Projection::All,
        )?;

        let next_cursor = if entries.len() == plan.limit {
            entries.last().and_then(|last| next_cursor(&plan, last))
        } else {
            None
        };

        debug!(
            event = %Event::ListQueried,
            context = %ctx.id(),
            list = %plan.list.name,
            domain = %plan.domain,
            served_by = %conn.served_by(),
            rows = entries.len(),
            more = next_cursor.is_some(),
            "list page served"
        );

        Ok(ListPage {
            entries,
            next_cursor,
        })
    }

    /// Number of entries in a list, optionally restricted to one shard.
    pub fn count(
        &self,
        ctx: &ConsistencyContext,
        list: &str,
        shard: Option<&ShardKey>,
    ) -> AccessResult<u64> {
        let list = self.compiler.compile(list)?;
        let filter = shard_filter(list.predicate, shard);
        let conn = self
            .router
            .connection(ctx, ReadTarget::Replica, &self.router.domain_for(shard))?;
        conn.count(filter)
    }
}

fn shard_filter(predicate: Filter, shard: Option<&ShardKey>) -> Filter {
    match shard {
        Some(shard) => predicate.and(Predicate::eq(Column::Shard, shard.as_str()).into()),
        None => predicate,
    }
}

fn next_cursor(plan: &ListPlan, last: &Entry) -> Option<String> {
    let id = last.id?;
    let sort_value = plan.list.sort_column().map(|column| column.read(last));
    let cursor = Cursor::new(sort_value, id).scoped(plan.scope);
    Some(OffsetCodec::encode_cursor(&cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::cluster::MemoryCluster;
    use crate::error::AccessError;
    use crate::filter::CompareOp;
    use crate::lists::{ConditionSpec, ListDefinition, ListRegistry, TableLayout};
    use crate::model::{EntryId, Value};
    use crate::router::RouterConfig;

    fn builder(cluster: &MemoryCluster) -> ListQueryBuilder {
        let table = TableLayout::with_fields(["score", "hidden"]);
        let sorts = BTreeMap::from([("score".to_string(), "score".to_string())]);
        let lists = BTreeMap::from([
            (
                "top-rated".to_string(),
                ListDefinition::new()
                    .with_condition(ConditionSpec::new("hidden", CompareOp::Eq, false))
                    .sorted_by("score", SortDirection::Desc),
            ),
            ("all".to_string(), ListDefinition::new()),
        ]);
        let registry = ListRegistry::build(table, &sorts, &lists).unwrap();
        let router = ConnectionRouter::new(Arc::new(cluster.clone()), RouterConfig::default());
        ListQueryBuilder::new(ConditionCompiler::new(Arc::new(registry)), Arc::new(router))
    }

    fn seeded() -> MemoryCluster {
        let cluster = MemoryCluster::new(1);
        cluster
            .seed([9, 7, 7, 5, 3].into_iter().map(|score| {
                Entry::new("wiki7")
                    .with_field("score", score)
                    .with_field("hidden", false)
            }))
            .unwrap();
        cluster
    }

    fn pairs(page: &ListPage) -> Vec<(u64, Value)> {
        page.entries
            .iter()
            .map(|e| (e.id.unwrap().value(), e.get("score").cloned().unwrap()))
            .collect()
    }

    #[test]
    fn test_top_rated_pages() {
        let cluster = seeded();
        let b = builder(&cluster);
        let ctx = ConsistencyContext::new();

        let page1 = b.query(&ctx, &ListRequest::new("top-rated", 2)).unwrap();
        assert_eq!(pairs(&page1), vec![(1, Value::Int(9)), (2, Value::Int(7))]);
        let cursor = OffsetCodec::decode(page1.next_cursor.as_ref().unwrap()).unwrap();
        assert_eq!(cursor.sort_value, Some(Value::Int(7)));
        assert_eq!(cursor.id, EntryId::new(2));

        let page2 = b
            .query(&ctx, &ListRequest::new("top-rated", 2).resume(page1.next_cursor))
            .unwrap();
        assert_eq!(pairs(&page2), vec![(3, Value::Int(7)), (4, Value::Int(5))]);

        let page3 = b
            .query(&ctx, &ListRequest::new("top-rated", 2).resume(page2.next_cursor))
            .unwrap();
        assert_eq!(pairs(&page3), vec![(5, Value::Int(3))]);
        assert!(page3.next_cursor.is_none());
    }

    #[test]
    fn test_plan_display() {
        let cluster = seeded();
        let plan = builder(&cluster)
            .plan(&ListRequest::new("top-rated", 2).in_shard("wiki7"))
            .unwrap();
        let text = plan.to_string();

        assert!(text.contains("filter: hidden = false AND <shard> = 'wiki7'"));
        assert!(text.contains("order:  score DESC, <id> ASC"));
        assert_eq!(plan.domain, Domain::from("wiki7"));
    }

    #[test]
    fn test_missing_shard_uses_default_domain() {
        let cluster = seeded();
        let plan = builder(&cluster)
            .plan(&ListRequest::new("all", 10))
            .unwrap();
        assert_eq!(plan.domain, Domain::from("default"));
    }

    #[test]
    fn test_unknown_list() {
        let cluster = seeded();
        let err = builder(&cluster)
            .query(&ConsistencyContext::new(), &ListRequest::new("no-such-list", 2))
            .unwrap_err();
        assert_eq!(err, AccessError::UnknownList("no-such-list".into()));
    }

    #[test]
    fn test_malformed_cursor() {
        let cluster = seeded();
        let err = builder(&cluster)
            .query(
                &ConsistencyContext::new(),
                &ListRequest::new("top-rated", 2).after("%%%"),
            )
            .unwrap_err();
        assert_eq!(err.code(), "REPLI_INVALID_CURSOR");
    }

    #[test]
    fn test_cursor_from_other_direction_yields_empty_page() {
        let cluster = seeded();
        let b = builder(&cluster);
        let ctx = ConsistencyContext::new();

        let page = b.query(&ctx, &ListRequest::new("top-rated", 2)).unwrap();
        let reversed = ListRequest::new("top-rated", 2)
            .paged(SortDirection::Desc)
            .resume(page.next_cursor);
        let page = b.query(&ctx, &reversed).unwrap();

        assert!(page.is_empty());
        assert!(!page.has_more());
    }

    #[test]
    fn test_cursor_shape_mismatch_yields_empty_page() {
        let cluster = seeded();
        let token = OffsetCodec::encode(None, EntryId::new(1));
        let page = builder(&cluster)
            .query(
                &ConsistencyContext::new(),
                &ListRequest::new("top-rated", 2).after(token),
            )
            .unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn test_zero_limit_reads_nothing() {
        let cluster = seeded();
        cluster.set_reachable(0, false);
        cluster.set_reachable(1, false);

        let page = builder(&cluster)
            .query(&ConsistencyContext::new(), &ListRequest::new("top-rated", 0))
            .unwrap();
        assert_eq!(page, ListPage::empty());
    }

    #[test]
    fn test_count() {
        let cluster = seeded();
        let b = builder(&cluster);
        let ctx = ConsistencyContext::new();

        assert_eq!(b.count(&ctx, "top-rated", None).unwrap(), 5);
        assert_eq!(b.count(&ctx, "top-rated", Some(&ShardKey::from("wiki7"))).unwrap(), 5);
        assert_eq!(b.count(&ctx, "top-rated", Some(&ShardKey::from("wiki8"))).unwrap(), 0);
    }
}
