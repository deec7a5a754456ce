//! Observability for the access layer
//!
//! Structured logging goes through `tracing`; every routing decision,
//! catch-up wait and write carries an `event` field from the `Event`
//! catalogue plus the consistency context id. `init_logging` installs a
//! `tracing-subscriber` fmt subscriber for binaries.
//!
//! # Usage
//!
//! ```ignore
//! use replistore::observability::{init_logging, Event};
//!
//! init_logging("info");
//! tracing::info!(event = %Event::ConfigLoaded, lists = 3, "configuration loaded");
//! ```

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Calling it twice is harmless: the second install is ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
