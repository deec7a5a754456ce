//! CLI command implementations
//!
//! Commands only read files; nothing is persisted. `query` runs against an
//! in-memory cluster seeded from the given entries.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::access::AccessLayer;
use crate::cluster::{MemoryCluster, Topology};
use crate::config::AccessConfig;
use crate::lists::ConditionCompiler;
use crate::model::Entry;
use crate::query::{ListPlan, ListRequest};

use super::args::{Command, PageArgs};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    let data = match command {
        Command::Validate { config } => validate(&config)?,
        Command::Explain { config, page } => explain(&config, &page)?,
        Command::Query {
            config,
            entries,
            replicas,
            page,
        } => query(&config, &entries, replicas, &page)?,
    };
    write_response(data)
}

/// Load the config and describe every registered list.
pub fn validate(config_path: &Path) -> CliResult<Value> {
    let config = AccessConfig::load(config_path)?;
    let compiler = ConditionCompiler::new(Arc::new(config.registry()?));

    let lists: Vec<Value> = compiler
        .registry()
        .lists()
        .map(|list| {
            json!({
                "name": list.name,
                "filter": list.predicate.to_string(),
                "sort": list.sort.as_ref().map(|s| s.name.clone()),
                "direction": list.direction.as_str(),
            })
        })
        .collect();

    Ok(json!({
        "lists": lists,
        "sorts": config.sorts,
        "condition_fields": compiler.all_conditions(),
    }))
}

/// Plan a list page without reading any data.
pub fn explain(config_path: &Path, page: &PageArgs) -> CliResult<Value> {
    let config = AccessConfig::load(config_path)?;
    // planning never touches an endpoint
    let layer = AccessLayer::new(&config, Arc::new(MemoryCluster::new(0)))?;
    let plan = layer.lists().plan(&request(page))?;
    Ok(plan_json(&plan))
}

/// Seed an in-memory cluster and fetch one page.
pub fn query(
    config_path: &Path,
    entries_path: &Path,
    replicas: usize,
    page: &PageArgs,
) -> CliResult<Value> {
    let config = AccessConfig::load(config_path)?;
    let entries = load_entries(entries_path)?;

    let cluster = MemoryCluster::new(replicas);
    cluster.seed(entries)?;
    let topology: Arc<dyn Topology> = Arc::new(cluster);
    let layer = AccessLayer::new(&config, topology)?;

    let ctx = layer.context();
    let request = request(page);
    let result = layer.lists().query(&ctx, &request)?;

    Ok(json!({
        "entries": serde_json::to_value(&result.entries)?,
        "next_cursor": result.next_cursor,
        "allow_cache": layer.store().allow_cache(request.shard.as_ref()),
    }))
}

fn request(page: &PageArgs) -> ListRequest {
    let mut request = ListRequest::new(page.list.clone(), page.limit)
        .paged(page.direction.into())
        .resume(page.cursor.clone());
    if let Some(shard) = &page.shard {
        request = request.in_shard(shard.clone());
    }
    if let Some(sort) = &page.sort {
        request = request.sorted_by(sort.clone());
    }
    request
}

fn plan_json(plan: &ListPlan) -> Value {
    let order: Vec<String> = plan.order.iter().map(|k| k.to_string()).collect();
    json!({
        "list": plan.list.name,
        "domain": plan.domain.as_str(),
        "paging": plan.paging.as_str(),
        "filter": plan.filter.to_string(),
        "order": order,
        "limit": plan.limit,
        "empty": plan.is_empty(),
        "text": plan.to_string(),
    })
}

fn load_entries(path: &Path) -> CliResult<Vec<Entry>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::input(format!("failed to read {}: {}", path.display(), e))
    })?;
    let entries: Vec<Entry> = serde_json::from_str(&content)?;
    Ok(entries)
}
