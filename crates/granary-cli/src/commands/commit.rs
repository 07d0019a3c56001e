//! Commit command - run the staging-to-catalog pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use granary_catalog::{CommitOptions, CommitPipeline, CommitSummary, MissingAssetPolicy};
use granary_core::LocalBackend;

use crate::OutputFormat;

/// Arguments for the commit command.
#[derive(Debug, Args)]
pub struct CommitArgs {
    /// Staging root directory to scan for bundles.
    #[arg(long, env = "GRANARY_STAGING_ROOT")]
    pub staging_root: PathBuf,

    /// Catalog root directory to promote into.
    #[arg(long, env = "GRANARY_CATALOG_ROOT")]
    pub catalog_root: PathBuf,

    /// Trash root directory for archived staging inputs.
    #[arg(long, env = "GRANARY_TRASH_ROOT")]
    pub trash_root: PathBuf,

    /// Report planned actions without touching any root.
    #[arg(long)]
    pub dry_run: bool,

    /// Fail a bundle when a referenced asset is missing instead of warning.
    #[arg(long)]
    pub strict_assets: bool,

    /// Per-bundle processing deadline in seconds.
    #[arg(long, default_value = "600")]
    pub deadline_secs: u64,
}

/// Execute the commit command.
///
/// # Errors
///
/// Returns an error if the staging root cannot be scanned, the summary
/// cannot be rendered, or any bundle failed to commit.
pub async fn execute(args: CommitArgs, format: OutputFormat) -> Result<()> {
    let staging = Arc::new(LocalBackend::new(&args.staging_root));
    let catalog = Arc::new(LocalBackend::new(&args.catalog_root));
    let trash = Arc::new(LocalBackend::new(&args.trash_root));

    let mut options = if args.dry_run {
        CommitOptions::dry_run()
    } else {
        CommitOptions::default()
    };
    if args.strict_assets {
        options = options.with_missing_assets(MissingAssetPolicy::Reject);
    }
    options = options.with_bundle_deadline(Duration::from_secs(args.deadline_secs));

    let summary = CommitPipeline::new(staging, catalog, trash)
        .with_options(options)
        .run()
        .await
        .context("commit run failed")?;

    render(&summary, format)?;

    if summary.has_failures() {
        anyhow::bail!(
            "{} bundle(s) failed; staging inputs preserved for retry",
            summary.failed.len()
        );
    }
    Ok(())
}

fn render(summary: &CommitSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(summary).context("Failed to serialize summary")?
            );
        }
        OutputFormat::Text => {
            print!("{summary}");
        }
    }
    Ok(())
}
