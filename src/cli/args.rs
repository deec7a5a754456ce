//! CLI argument definitions using clap
//!
//! Commands:
//! - replistore validate --config <path>
//! - replistore explain --config <path> --list <name>
//! - replistore query --config <path> --entries <path> --list <name>

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::filter::SortDirection;

/// replistore - replica-aware entry storage with stable list pagination
#[derive(Parser, Debug)]
#[command(name = "replistore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate a configuration file, then print its lists
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./replistore.json")]
        config: PathBuf,
    },

    /// Print the compiled filter and ordering of a list page
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./replistore.json")]
        config: PathBuf,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Load entries into an in-memory cluster and fetch one list page
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./replistore.json")]
        config: PathBuf,

        /// JSON array of entries to seed
        #[arg(long)]
        entries: PathBuf,

        /// Number of replicas in the in-memory cluster
        #[arg(long, default_value_t = 1)]
        replicas: usize,

        #[command(flatten)]
        page: PageArgs,
    },
}

/// Arguments describing one list page
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// List name
    #[arg(long)]
    pub list: String,

    /// Restrict to one shard key
    #[arg(long)]
    pub shard: Option<String>,

    /// Cursor returned by a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Rows per page
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Paging direction relative to the list's natural order
    #[arg(long, value_enum, default_value_t = DirectionArg::Asc)]
    pub direction: DirectionArg,

    /// Registered sort replacing the list's own
    #[arg(long)]
    pub sort: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionArg {
    Asc,
    Desc,
}

impl From<DirectionArg> for SortDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Asc => SortDirection::Asc,
            DirectionArg::Desc => SortDirection::Desc,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
