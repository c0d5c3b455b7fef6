//! Rover CLI - Main entry point

use clap::Parser;
use rover_cli::{Cli, Commands};
use rover_common::{init_logging, LogConfig, LogLevel};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }

    // The CLI should work even when logging cannot initialize
    let _ = init_logging(&log_config);

    let result = execute_command(&cli).await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Sniff { path, hints } => rover_cli::commands::sniff::run(path, hints),
        Commands::Copy { source, dest } => rover_cli::commands::copy::run(source, dest).await,
    }
}
