//! CLI module for replistore
//!
//! Provides command-line interface for:
//! - validate: Load a configuration file and describe its lists
//! - explain: Show the compiled query of a list page
//! - query: Fetch a list page from an in-memory cluster seeded from a file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, DirectionArg, PageArgs};
pub use commands::{explain, query, run_command, validate};
pub use errors::{CliError, CliErrorKind, CliResult};
pub use io::{write_response, write_response_to};

use crate::observability::init_logging;

/// Parse arguments, set up logging and run the command.
pub fn run() -> CliResult<()> {
    init_logging("warn");
    let cli = Cli::parse_args();
    run_command(cli.command)
}
