//! # granary-cli
//!
//! Command-line interface for the Granary dataset catalog.
//!
//! ## Commands
//!
//! - `granary commit` - Commit staged bundles into the catalog
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `GRANARY_STAGING_ROOT` - Staging root directory
//! - `GRANARY_CATALOG_ROOT` - Catalog root directory
//! - `GRANARY_TRASH_ROOT` - Trash root directory
//! - `RUST_LOG` - Log level filter (default: `info`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use clap::{Parser, Subcommand};

/// Granary CLI - dataset catalog command-line interface.
#[derive(Debug, Parser)]
#[command(name = "granary")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Log output format.
    #[arg(long, env = "GRANARY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Commit staged bundles into the catalog.
    Commit(commands::commit::CommitArgs),
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
    /// JSON structured logs (for production).
    Json,
}

impl From<LogFormat> for granary_core::observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Json => Self::Json,
        }
    }
}
