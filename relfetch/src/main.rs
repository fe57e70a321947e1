mod cli;
mod commands;
mod progress;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use relfetch_lib::logging::initialize_logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    initialize_logging();
    let cli = Cli::parse();
    cli.run().await
}
