//! Mytube CLI - Command-line interface
//!
//! Drives the upload and playback pipelines from the terminal.

mod commands;

use clap::Parser;
use mytube_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "mytube")]
#[command(about = "Chunked video upload and playback for Mytube")]
struct Cli {
    /// Console log level; the debug log file always records everything
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)?;

    commands::handle_command(cli.command).await
}
