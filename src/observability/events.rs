//! Observable events
//!
//! Events are explicit and typed. They are emitted through `tracing` with
//! the event name in the `event` field, so log pipelines can filter on a
//! stable identifier instead of message text.

use std::fmt;

/// Observable events of the access layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Configuration rejected
    ConfigRejected,

    // Routing
    /// Replica-class read served by a replica
    RouteReplica,
    /// Replica-class read redirected to the primary after a write
    RouteForcedPrimary,
    /// Primary connection handed out; domain marked written
    RoutePrimary,
    /// Replica unreachable, read fell back to the primary
    ReplicaFallback,

    // Catch-up waits
    /// Catch-up wait begins
    CatchupWaitBegin,
    /// Replicas reached the awaited position
    CatchupWaitComplete,
    /// One catch-up attempt ran out of time
    CatchupAttemptTimeout,
    /// All catch-up attempts ran out of time
    CatchupTimeout,

    // Reads
    /// List page served
    ListQueried,
    /// Cursor produced for another list or direction
    CursorScopeMismatch,
    /// Replica lag too high for results to be cached
    CacheDisallowed,

    // Writes
    /// Write acknowledged by the primary
    WriteCommit,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigRejected => "CONFIG_REJECTED",

            Event::RouteReplica => "ROUTE_REPLICA",
            Event::RouteForcedPrimary => "ROUTE_FORCED_PRIMARY",
            Event::RoutePrimary => "ROUTE_PRIMARY",
            Event::ReplicaFallback => "REPLICA_FALLBACK",

            Event::CatchupWaitBegin => "CATCHUP_WAIT_BEGIN",
            Event::CatchupWaitComplete => "CATCHUP_WAIT_COMPLETE",
            Event::CatchupAttemptTimeout => "CATCHUP_ATTEMPT_TIMEOUT",
            Event::CatchupTimeout => "CATCHUP_TIMEOUT",

            Event::ListQueried => "LIST_QUERY_COMPLETE",
            Event::CursorScopeMismatch => "CURSOR_SCOPE_MISMATCH",
            Event::CacheDisallowed => "CACHE_DISALLOWED",

            Event::WriteCommit => "WRITE_COMMIT",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
