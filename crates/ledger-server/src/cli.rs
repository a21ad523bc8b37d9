//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ledger-server")]
#[command(version)]
#[command(about = "Flume fleet ledger: registration, heartbeat, and snapshot fanout server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path (defaults to searching standard locations).
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a configuration file without starting the server.
    Test {
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },
    /// Run pending schema migrations and exit (the ledger's schema is
    /// applied automatically on connect, so this is a no-op kept for
    /// operational parity with deployments that script migrations
    /// separately from server startup).
    Migrate,
}
