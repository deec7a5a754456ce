//! Router configuration
//!
//! Timeouts bound every network call; catch-up waits retry a bounded
//! number of times with linear backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, AccessResult};

/// Connection routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Deadline for executing one statement (default: 2000)
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Deadline for one catch-up wait attempt (default: 1000)
    #[serde(default = "default_catchup_timeout_ms")]
    pub catchup_timeout_ms: u64,

    /// Catch-up attempts before giving up (default: 2)
    #[serde(default = "default_catchup_attempts")]
    pub catchup_attempts: u32,

    /// Backoff unit between catch-up attempts (default: 50)
    #[serde(default = "default_catchup_backoff_ms")]
    pub catchup_backoff_ms: u64,

    /// Replica lag above which read results must not be cached (default: 5000)
    #[serde(default = "default_max_replica_lag_ms")]
    pub max_replica_lag_ms: u64,

    /// Serve replica-class reads from the primary when no replica is reachable
    #[serde(default = "default_replica_fallback")]
    pub replica_fallback: bool,
}

fn default_statement_timeout_ms() -> u64 {
    2000
}

fn default_catchup_timeout_ms() -> u64 {
    1000
}

fn default_catchup_attempts() -> u32 {
    2
}

fn default_catchup_backoff_ms() -> u64 {
    50
}

fn default_max_replica_lag_ms() -> u64 {
    5000
}

fn default_replica_fallback() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: default_statement_timeout_ms(),
            catchup_timeout_ms: default_catchup_timeout_ms(),
            catchup_attempts: default_catchup_attempts(),
            catchup_backoff_ms: default_catchup_backoff_ms(),
            max_replica_lag_ms: default_max_replica_lag_ms(),
            replica_fallback: default_replica_fallback(),
        }
    }
}

impl RouterConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn catchup_timeout(&self) -> Duration {
        Duration::from_millis(self.catchup_timeout_ms)
    }

    pub fn catchup_backoff(&self) -> Duration {
        Duration::from_millis(self.catchup_backoff_ms)
    }

    pub fn max_replica_lag(&self) -> Duration {
        Duration::from_millis(self.max_replica_lag_ms)
    }

    /// Rejects unbounded or zero-length waits.
    pub fn validate(&self) -> AccessResult<()> {
        if self.statement_timeout_ms == 0 {
            return Err(AccessError::config("router.statement_timeout_ms must be > 0"));
        }
        if self.catchup_timeout_ms == 0 {
            return Err(AccessError::config("router.catchup_timeout_ms must be > 0"));
        }
        if self.catchup_attempts == 0 {
            return Err(AccessError::config("router.catchup_attempts must be >= 1"));
        }
        Ok(())
    }
}
