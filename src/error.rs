//! Access layer error taxonomy
//!
//! Error codes:
//! - REPLI_CONNECTION_UNAVAILABLE (transient)
//! - REPLI_CATCHUP_TIMEOUT (transient)
//! - REPLI_UNKNOWN_LIST (permanent, programmer error)
//! - REPLI_UNKNOWN_SORT (permanent, programmer error)
//! - REPLI_INVALID_CURSOR (permanent, bad request)
//! - REPLI_NOT_FOUND (permanent)
//! - REPLI_CONSTRAINT_VIOLATION (permanent)
//! - REPLI_INVALID_CONFIG (fatal at startup)
//!
//! Callers above this layer map transient errors to a retry-later response
//! and everything else to a permanent failure.

use std::time::Duration;

use thiserror::Error;

use crate::model::{EntryId, ShardKey};

/// Result type for access layer operations
pub type AccessResult<T> = Result<T, AccessError>;

/// Access layer errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    /// No reachable endpoint for the requested target
    #[error("connection unavailable for {target}: {reason}")]
    ConnectionUnavailable {
        /// Target that could not be served (e.g. "primary", "replica #2")
        target: String,
        /// Transport-level reason
        reason: String,
    },

    /// Replicas did not reach the required position before the deadline
    #[error("replicas did not catch up for domain {domain} within {waited:?}")]
    CatchupTimeout {
        /// Replication domain that was waiting
        domain: String,
        /// Total time spent waiting across attempts
        waited: Duration,
    },

    /// List name is not registered
    #[error("unknown list: {0}")]
    UnknownList(String),

    /// Sort name is not registered
    #[error("unknown sort: {0}")]
    UnknownSort(String),

    /// Cursor token is malformed or tampered with
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Keyed row does not exist
    #[error("entry {id} not found in shard {shard}")]
    NotFound {
        /// Entry identifier
        id: EntryId,
        /// Shard key the entry was addressed with
        shard: ShardKey,
    },

    /// Duplicate or invalid data on write
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Configuration rejected at load time
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AccessError {
    /// Create a connection unavailable error.
    pub fn unavailable(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionUnavailable {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation(message.into())
    }

    /// Create an invalid configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an invalid cursor error.
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::InvalidCursor(message.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable { .. } => "REPLI_CONNECTION_UNAVAILABLE",
            Self::CatchupTimeout { .. } => "REPLI_CATCHUP_TIMEOUT",
            Self::UnknownList(_) => "REPLI_UNKNOWN_LIST",
            Self::UnknownSort(_) => "REPLI_UNKNOWN_SORT",
            Self::InvalidCursor(_) => "REPLI_INVALID_CURSOR",
            Self::NotFound { .. } => "REPLI_NOT_FOUND",
            Self::ConstraintViolation(_) => "REPLI_CONSTRAINT_VIOLATION",
            Self::InvalidConfig(_) => "REPLI_INVALID_CONFIG",
        }
    }

    /// Transient failures may succeed if the same call is repeated later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionUnavailable { .. } | Self::CatchupTimeout { .. }
        )
    }

    /// Programmer errors that must never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownList(_) | Self::UnknownSort(_) | Self::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(AccessError::unavailable("primary", "refused").is_transient());
        assert!(AccessError::CatchupTimeout {
            domain: "wiki7".into(),
            waited: Duration::from_millis(10),
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!AccessError::UnknownList("x".into()).is_transient());
        assert!(!AccessError::cursor("bad").is_transient());
        assert!(!AccessError::NotFound {
            id: EntryId::new(1),
            shard: ShardKey::from("a"),
        }
        .is_transient());
        assert!(!AccessError::constraint("dup").is_transient());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(AccessError::UnknownList("x".into()).is_fatal());
        assert!(AccessError::config("x").is_fatal());
        assert!(!AccessError::cursor("x").is_fatal());
    }

    #[test]
    fn test_codes_and_display() {
        let err = AccessError::UnknownList("top-rated".into());
        assert_eq!(err.code(), "REPLI_UNKNOWN_LIST");
        assert_eq!(err.to_string(), "unknown list: top-rated");

        let err = AccessError::NotFound {
            id: EntryId::new(42),
            shard: ShardKey::from("wiki7"),
        };
        assert_eq!(err.code(), "REPLI_NOT_FOUND");
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("wiki7"));
    }
}
