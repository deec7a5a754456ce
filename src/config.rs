//! Access layer configuration
//!
//! Loaded once at startup from a JSON file. Unknown keys are rejected, and
//! every list and sort is resolved against the table layout before the
//! configuration is accepted.
//!
//! ```json
//! {
//!   "table": { "id_column": "id", "shard_column": "shard", "fields": ["score", "hidden"] },
//!   "default_domain": "default",
//!   "router": { "catchup_timeout_ms": 1000, "replica_fallback": true },
//!   "sorts": { "score": "score" },
//!   "lists": {
//!     "top-rated": {
//!       "conditions": [{ "field": "hidden", "op": "eq", "value": false }],
//!       "sort": "score",
//!       "direction": "desc"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::consistency::DEFAULT_DOMAIN;
use crate::error::{AccessError, AccessResult};
use crate::lists::{ListDefinition, ListRegistry, TableLayout};
use crate::observability::Event;
use crate::router::RouterConfig;

/// Complete access layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Entry table layout
    #[serde(default)]
    pub table: TableLayout,

    /// Domain for operations without a shard key (default: "default")
    #[serde(default = "default_domain")]
    pub default_domain: String,

    /// Routing and catch-up settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Named sorts: sort name to field name
    #[serde(default)]
    pub sorts: BTreeMap<String, String>,

    /// Named lists
    #[serde(default)]
    pub lists: BTreeMap<String, ListDefinition>,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            table: TableLayout::default(),
            default_domain: default_domain(),
            router: RouterConfig::default(),
            sorts: BTreeMap::new(),
            lists: BTreeMap::new(),
        }
    }
}

impl AccessConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AccessError::config(format!("failed to read {}: {}", path.display(), e))
        })?;

        match Self::from_json_str(&content) {
            Ok(config) => {
                info!(
                    event = %Event::ConfigLoaded,
                    path = %path.display(),
                    lists = config.lists.len(),
                    sorts = config.sorts.len(),
                    "configuration loaded"
                );
                Ok(config)
            }
            Err(err) => {
                warn!(
                    event = %Event::ConfigRejected,
                    path = %path.display(),
                    error = %err,
                    "configuration rejected"
                );
                Err(err)
            }
        }
    }

    /// Parses and validates configuration JSON.
    pub fn from_json_str(json: &str) -> AccessResult<Self> {
        let config: AccessConfig = serde_json::from_str(json)
            .map_err(|e| AccessError::config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AccessResult<()> {
        self.registry().map(|_| ())
    }

    /// Builds the list registry, validating every setting on the way.
    pub fn registry(&self) -> AccessResult<ListRegistry> {
        self.router.validate()?;
        if self.default_domain.is_empty() {
            return Err(AccessError::config("default_domain must not be empty"));
        }
        ListRegistry::build(self.table.clone(), &self.sorts, &self.lists)
    }
}
