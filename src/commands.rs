//! CLI command definitions
//!
//! Defines the clap commands for the procinfo CLI.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Print launchd's attributes for a process
    #[command(alias = "q")]
    Query {
        /// Process ID to look up
        pid: i64,

        /// Print JSON instead of key/value lines
        #[arg(long)]
        json: bool,

        /// Give up waiting for launchd after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print how launchd says a process was started
    Provenance {
        /// Process ID to look up
        pid: i64,

        /// Print JSON instead of key/value lines
        #[arg(long)]
        json: bool,
    },

    /// Check whether launchd can be queried from this process
    Doctor,
}
