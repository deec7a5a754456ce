//! Read-your-writes tracking
//!
//! One record per replication domain: "a write happened here and no replica
//! has been confirmed caught up since". Records are created on first write
//! and cleared only after a successful catch-up wait.
//!
//! Clearing is a compare-and-clear on the record's write generation. A write
//! that lands while a catch-up wait is in flight bumps the generation, so the
//! wait that started before it can never clear its flag.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::model::ShardKey;
use crate::router::ReadTarget;

/// Domain of operations that carry no shard key, unless configured otherwise
pub const DEFAULT_DOMAIN: &str = "default";

/// A logical replication domain (e.g. one tenant)
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Domain(String);

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ShardKey> for Domain {
    fn from(shard: &ShardKey) -> Self {
        Self(shard.as_str().to_string())
    }
}

impl From<&str> for Domain {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Outcome of resolving a read target against the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResolution {
    /// Safe to use the requested target
    AsRequested,
    /// Outstanding write: serve a replica-class read from the primary
    ForcedPrimary,
    /// Replicas must be waited for before the requested target is safe.
    /// Each `(domain, generation)` must be handed back to `clear_if_unchanged`.
    CatchUpRequired { pending: Vec<(Domain, u64)> },
}

#[derive(Debug, Default, Clone, Copy)]
struct DomainRecord {
    written: bool,
    generation: u64,
}

/// Per-domain write flags
#[derive(Debug, Default)]
pub struct ConsistencyTracker {
    domains: Mutex<HashMap<Domain, DomainRecord>>,
}

impl ConsistencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outstanding write on `domain`. Returns the new generation.
    pub fn mark_written(&self, domain: &Domain) -> u64 {
        let mut domains = self.domains.lock();
        let record = domains.entry(domain.clone()).or_default();
        record.written = true;
        record.generation += 1;
        record.generation
    }

    /// True if `domain` has a write no replica is confirmed to have applied.
    pub fn is_written(&self, domain: &Domain) -> bool {
        self.domains
            .lock()
            .get(domain)
            .map_or(false, |r| r.written)
    }

    /// True if any domain has an outstanding write.
    pub fn any_written(&self) -> bool {
        self.domains.lock().values().any(|r| r.written)
    }

    /// Resolves a requested read target for `domain`.
    ///
    /// Has no side effects: a replica read redirected to the primary leaves
    /// the flag set, so later replica reads keep being redirected without
    /// waiting.
    pub fn resolve(&self, domain: &Domain, requested: ReadTarget) -> ReadResolution {
        let pending = match self.domains.lock().get(domain) {
            Some(r) if r.written => vec![(domain.clone(), r.generation)],
            _ => Vec::new(),
        };
        Self::resolution(pending, requested)
    }

    /// Resolves a read that spans every domain, such as one without a
    /// shard key. Any outstanding write in the context counts.
    pub fn resolve_all(&self, requested: ReadTarget) -> ReadResolution {
        let mut pending: Vec<(Domain, u64)> = self
            .domains
            .lock()
            .iter()
            .filter(|(_, r)| r.written)
            .map(|(d, r)| (d.clone(), r.generation))
            .collect();
        pending.sort();
        Self::resolution(pending, requested)
    }

    fn resolution(pending: Vec<(Domain, u64)>, requested: ReadTarget) -> ReadResolution {
        if pending.is_empty() {
            return ReadResolution::AsRequested;
        }
        match requested {
            ReadTarget::Primary => ReadResolution::AsRequested,
            ReadTarget::Replica => ReadResolution::ForcedPrimary,
            ReadTarget::Specific(_) => ReadResolution::CatchUpRequired { pending },
        }
    }

    /// Clears the flag if no write happened since `generation` was observed.
    pub fn clear_if_unchanged(&self, domain: &Domain, generation: u64) -> bool {
        let mut domains = self.domains.lock();
        match domains.get_mut(domain) {
            Some(record) if record.generation == generation => {
                record.written = false;
                true
            }
            _ => false,
        }
    }
}

/// Consistency state for one logical unit of work (e.g. one inbound request).
///
/// Cheap to clone; clones share the same tracker. Unrelated requests use
/// separate contexts so one caller's write never forces another caller onto
/// the primary.
#[derive(Debug, Clone)]
pub struct ConsistencyContext {
    id: Uuid,
    tracker: Arc<ConsistencyTracker>,
}

impl ConsistencyContext {
    /// Creates a fresh context with no outstanding writes.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            tracker: Arc::new(ConsistencyTracker::new()),
        }
    }

    /// Identifier used to correlate log lines of one unit of work.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for ConsistencyContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ConsistencyContext {
    type Target = ConsistencyTracker;

    fn deref(&self) -> &Self::Target {
        &self.tracker
    }
}
