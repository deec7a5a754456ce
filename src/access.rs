//! Access layer assembly
//!
//! Wires one validated configuration and one topology into the router,
//! the condition compiler, the entry store and the list query builder.
//! All of them share the same router and registry.

use std::sync::Arc;

use crate::cluster::Topology;
use crate::config::AccessConfig;
use crate::consistency::{ConsistencyContext, Domain};
use crate::error::AccessResult;
use crate::lists::ConditionCompiler;
use crate::query::ListQueryBuilder;
use crate::router::ConnectionRouter;
use crate::store::EntryStore;

/// The assembled access layer
pub struct AccessLayer {
    router: Arc<ConnectionRouter>,
    compiler: ConditionCompiler,
    store: EntryStore,
    lists: ListQueryBuilder,
}

impl AccessLayer {
    pub fn new(config: &AccessConfig, topology: Arc<dyn Topology>) -> AccessResult<Self> {
        let registry = Arc::new(config.registry()?);
        let compiler = ConditionCompiler::new(registry);
        let router = Arc::new(
            ConnectionRouter::new(topology, config.router.clone())
                .with_default_domain(Domain::new(config.default_domain.clone())),
        );

        Ok(Self {
            store: EntryStore::new(Arc::clone(&router), compiler.clone()),
            lists: ListQueryBuilder::new(compiler.clone(), Arc::clone(&router)),
            compiler,
            router,
        })
    }

    /// A fresh consistency context for one unit of work.
    pub fn context(&self) -> ConsistencyContext {
        ConsistencyContext::new()
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn lists(&self) -> &ListQueryBuilder {
        &self.lists
    }

    pub fn compiler(&self) -> &ConditionCompiler {
        &self.compiler
    }

    pub fn router(&self) -> &ConnectionRouter {
        &self.router
    }
}
