//! procinfo - ask launchd about a running process
//!
//! Thin command-line caller over the launchd_procinfo library.

use clap::Parser;
use commands::Commands;
use launchd_procinfo::common::logging;
use launchd_procinfo::{cli, commands, Config};

#[derive(Parser)]
#[command(name = "procinfo", about = "Query launchd for process metadata")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match Config::load() {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
