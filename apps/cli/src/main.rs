//! conductor CLI: run collection plans against file-backed sources.
//!
//! Loads a plan from TOML, collects from every listed source with bounded
//! parallelism, and prints a per-source and plan-level report.

mod commands;
mod plan_file;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
