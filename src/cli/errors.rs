//! Operator-facing failures of the `replistore` binary
//!
//! Access layer errors keep their own `REPLI_*` code next to the CLI code so
//! scripts can tell an unknown list from a stale cursor. The exit status
//! separates bad configuration, unreadable input and failed access calls;
//! transient access failures exit with `EX_TEMPFAIL` so callers may retry.

use std::fmt;
use std::io;

use crate::error::AccessError;

/// What part of a CLI run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorKind {
    /// The configuration file was rejected
    Config,
    /// An input file or stdout could not be read, parsed or written
    Input,
    /// The access layer refused the request
    Access,
}

impl CliErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config => "REPLI_CLI_CONFIG_ERROR",
            Self::Input => "REPLI_CLI_INPUT_ERROR",
            Self::Access => "REPLI_CLI_ACCESS_FAILED",
        }
    }
}

/// A failed CLI run
#[derive(Debug)]
pub struct CliError {
    kind: CliErrorKind,
    message: String,
    /// Code of the underlying access error, if any
    access_code: Option<&'static str>,
    transient: bool,
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::plain(CliErrorKind::Config, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::plain(CliErrorKind::Input, message)
    }

    fn plain(kind: CliErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            access_code: None,
            transient: false,
        }
    }

    pub fn kind(&self) -> CliErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn access_code(&self) -> Option<&'static str> {
        self.access_code
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CliErrorKind::Config => 2,
            CliErrorKind::Input => 3,
            CliErrorKind::Access if self.transient => 75,
            CliErrorKind::Access => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.access_code {
            Some(code) => write!(f, "{} [{}]: {}", self.kind.code(), code, self.message),
            None => write!(f, "{}: {}", self.kind.code(), self.message),
        }
    }
}

impl std::error::Error for CliError {}

impl From<AccessError> for CliError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::InvalidConfig(msg) => Self::config(msg),
            other => Self {
                kind: CliErrorKind::Access,
                message: other.to_string(),
                access_code: Some(other.code()),
                transient: other.is_transient(),
            },
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::input(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::input(format!("JSON error: {}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;
