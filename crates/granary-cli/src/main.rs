//! Granary CLI - command-line interface for the dataset catalog.
//!
//! The main entry point for the `granary` CLI binary.

use anyhow::Result;
use clap::Parser;

use granary_cli::{Cli, Commands};
use granary_core::observability::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Commit(args) => granary_cli::commands::commit::execute(args, cli.format).await,
        }
    })
}
