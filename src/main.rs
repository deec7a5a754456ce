//! replistore CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`, printing errors to
//! stderr and exiting non-zero on failure. No configuration is loaded here.

use replistore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
