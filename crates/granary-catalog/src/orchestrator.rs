//! The commit orchestrator: discovery → promotion → verification →
//! archival across all staged bundles.
//!
//! Each bundle moves through an explicit state machine
//! (`Discovered → Promoted → Verified → Archived`); a failure at any stage
//! is terminal for that bundle only and the run continues. The ordering
//! guarantee (copy before archive, archive only after verify) is the sole
//! mechanism preventing data loss; every transition is idempotent and
//! safely retryable from a crash at any point.

use std::sync::Arc;

use serde::Serialize;
use ulid::Ulid;

use granary_core::{
    parse_partition_string, BuildStamp, CatalogPaths, PartitionSchema, StorageBackend,
};

use crate::archive::Archivist;
use crate::bundle::{BundleMeta, DatasetKey, StagedBundle};
use crate::discovery::{Discovery, SkippedBundle};
use crate::error::{CommitError, Result};
use crate::options::CommitOptions;
use crate::promote::{PromotionReport, Promoter};
use crate::verify::{Verifier, VerifyReport};

/// Pipeline state reached by a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleState {
    /// Selected by discovery; nothing promoted yet.
    Discovered,
    /// Catalog copy written; not yet verified.
    Promoted,
    /// Catalog copy verified; staging not yet consumed.
    Verified,
    /// Staging inputs relocated to the trash.
    Archived,
}

/// Final record for one processed bundle.
#[derive(Debug, Clone, Serialize)]
pub struct BundleOutcome {
    /// The bundle's logical dataset key.
    pub key: DatasetKey,
    /// The state the bundle reached.
    pub state: BundleState,
    /// Failure reason, or an archive-error note on an otherwise committed
    /// bundle.
    pub reason: Option<String>,
    /// Promotion details, if promotion ran.
    pub promotion: Option<PromotionReport>,
    /// Verification details, if verification ran.
    pub verification: Option<VerifyReport>,
    /// Trash-relative paths of archived staging files.
    pub archived: Vec<String>,
}

/// Summary of one commit run.
#[derive(Debug, Default, Serialize)]
pub struct CommitSummary {
    /// Run identifier tagging all log events of this run.
    pub run_id: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Bundles that reached `Verified` or `Archived`.
    pub committed: Vec<BundleOutcome>,
    /// Bundles excluded at discovery time or already up to date.
    pub skipped: Vec<SkippedBundle>,
    /// Bundles that failed; staging inputs remain for the next run.
    pub failed: Vec<BundleOutcome>,
}

impl CommitSummary {
    /// Returns true if any bundle failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl std::fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.dry_run { " (dry-run)" } else { "" };
        writeln!(f, "commit run {}{mode}", self.run_id)?;

        writeln!(f, "  committed: {}", self.committed.len())?;
        for outcome in &self.committed {
            let (copied, deduplicated, asset_failures) =
                outcome.promotion.as_ref().map_or((0, 0, 0), |p| {
                    (p.assets_copied, p.assets_deduplicated, p.asset_failures.len())
                });
            writeln!(
                f,
                "    {} [{}] assets: {copied} copied, {deduplicated} deduplicated, {asset_failures} failed",
                outcome.key,
                match outcome.state {
                    BundleState::Archived => "archived",
                    _ => "verified",
                },
            )?;
            if let Some(reason) = &outcome.reason {
                writeln!(f, "      note: {reason}")?;
            }
        }

        writeln!(f, "  skipped: {}", self.skipped.len())?;
        for skip in &self.skipped {
            writeln!(f, "    {}: {}", skip.path, skip.reason)?;
        }

        writeln!(f, "  failed: {}", self.failed.len())?;
        for outcome in &self.failed {
            writeln!(
                f,
                "    {}: {}",
                outcome.key,
                outcome.reason.as_deref().unwrap_or("unknown")
            )?;
        }
        Ok(())
    }
}

/// Internal per-bundle processing result.
enum Processed {
    Committed(BundleOutcome),
    Skipped(SkippedBundle),
    Failed(BundleOutcome),
}

/// Sequences the full commit pipeline over a staging root.
pub struct CommitPipeline {
    catalog: Arc<dyn StorageBackend>,
    schema: PartitionSchema,
    options: CommitOptions,
    discovery: Discovery,
    promoter: Promoter,
    verifier: Verifier,
    archivist: Archivist,
}

impl CommitPipeline {
    /// Creates a pipeline over the three storage roots with the built-in
    /// partition schema and default options.
    #[must_use]
    pub fn new(
        staging: Arc<dyn StorageBackend>,
        catalog: Arc<dyn StorageBackend>,
        trash: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            discovery: Discovery::new(staging.clone()),
            promoter: Promoter::new(staging.clone(), catalog.clone()),
            verifier: Verifier::new(staging.clone(), catalog.clone()),
            archivist: Archivist::new(staging, trash),
            schema: PartitionSchema::builtin(),
            options: CommitOptions::default(),
            catalog,
        }
    }

    /// Replaces the partition schema.
    #[must_use]
    pub fn with_schema(mut self, schema: PartitionSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Replaces the commit options.
    #[must_use]
    pub fn with_options(mut self, options: CommitOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs one commit pass over the staging root.
    ///
    /// Every discovered bundle is processed even if an earlier one fails;
    /// one dataset's failure never blocks or rolls back another's commit.
    ///
    /// # Errors
    ///
    /// Returns an error only if the staging root itself cannot be
    /// enumerated. Per-bundle errors are reported in the summary.
    pub async fn run(&self) -> Result<CommitSummary> {
        let run_id = Ulid::new().to_string();
        let stamp = BuildStamp::now().compact();

        tracing::info!(
            run_id = %run_id,
            dry_run = self.options.dry_run,
            "commit run starting"
        );

        let discovered = self.discovery.discover().await?;
        let mut summary = CommitSummary {
            run_id: run_id.clone(),
            dry_run: self.options.dry_run,
            skipped: discovered.skipped,
            ..CommitSummary::default()
        };

        for (key, bundle) in discovered.selected {
            let deadline = self.options.bundle_deadline;
            let processed =
                match tokio::time::timeout(deadline, self.process(&key, &bundle, &stamp)).await {
                    Ok(processed) => processed,
                    Err(_) => Processed::Failed(BundleOutcome {
                        key: key.clone(),
                        state: BundleState::Discovered,
                        reason: Some(
                            CommitError::Timeout {
                                seconds: deadline.as_secs(),
                            }
                            .to_string(),
                        ),
                        promotion: None,
                        verification: None,
                        archived: Vec::new(),
                    }),
                };

            match processed {
                Processed::Committed(outcome) => summary.committed.push(outcome),
                Processed::Skipped(skip) => summary.skipped.push(skip),
                Processed::Failed(outcome) => {
                    tracing::error!(
                        run_id = %run_id,
                        key = %outcome.key,
                        reason = outcome.reason.as_deref().unwrap_or("unknown"),
                        "bundle failed; staging preserved for retry"
                    );
                    summary.failed.push(outcome);
                }
            }
        }

        tracing::info!(
            run_id = %run_id,
            committed = summary.committed.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "commit run finished"
        );
        Ok(summary)
    }

    /// Runs the promote → verify → archive sequence for one bundle.
    async fn process(&self, key: &DatasetKey, bundle: &StagedBundle, stamp: &str) -> Processed {
        let mut outcome = BundleOutcome {
            key: key.clone(),
            state: BundleState::Discovered,
            reason: None,
            promotion: None,
            verification: None,
            archived: Vec::new(),
        };

        // Schema validation precedes every mutation.
        let partitions = parse_partition_string(&bundle.meta.partitions);
        let dims = match self.schema.ordered_values(&bundle.meta.task, &partitions) {
            Ok(dims) => dims,
            Err(e) => {
                outcome.reason = Some(CommitError::from(e).to_string());
                return Processed::Failed(outcome);
            }
        };
        let entry_dir = match CatalogPaths::entry_dir(
            &key.provider,
            &key.dataset,
            &key.task,
            &key.variant,
            &dims,
        ) {
            Ok(dir) => dir,
            Err(e) => {
                outcome.reason = Some(CommitError::from(e).to_string());
                return Processed::Failed(outcome);
            }
        };

        // Only a strictly older staged build is stale staging left behind
        // by an earlier selection; re-promoting it would roll the catalog
        // backwards. An equal stamp is a promotion that never passed
        // verification (archival consumes staging on success), so it must
        // run again.
        if let Some(committed) = self.committed_build(&entry_dir).await {
            if bundle.build_stamp < committed {
                tracing::info!(key = %key, "catalog entry is up to date; skipping");
                return Processed::Skipped(SkippedBundle {
                    path: bundle.meta_path.clone(),
                    reason: format!(
                        "catalog entry is up to date (committed build {})",
                        committed.raw()
                    ),
                });
            }
        }

        let promotion = match self
            .promoter
            .promote(bundle, &entry_dir, &self.options)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                outcome.reason = Some(e.to_string());
                return Processed::Failed(outcome);
            }
        };
        outcome.state = BundleState::Promoted;
        outcome.promotion = Some(promotion.clone());

        let verification = if self.options.dry_run {
            self.verifier
                .verify_staged(bundle, self.options.missing_assets)
                .await
        } else {
            self.verifier
                .verify_catalog(bundle, &promotion, self.options.missing_assets)
                .await
        };
        match verification {
            Ok(report) => {
                outcome.state = BundleState::Verified;
                outcome.verification = Some(report);
            }
            Err(e) => {
                outcome.reason = Some(e.to_string());
                return Processed::Failed(outcome);
            }
        }

        // Archival consumes staging only now that the catalog copy is
        // verified. An archive failure leaves the bundle committed.
        for path in [&bundle.data_path, &bundle.meta_path] {
            match self.archivist.archive(path, stamp, &self.options).await {
                Ok(trash_path) => outcome.archived.push(trash_path),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        path = %path,
                        error = %e,
                        "archive failed; catalog entry remains committed"
                    );
                    outcome.reason = Some(e.to_string());
                    return Processed::Committed(outcome);
                }
            }
        }
        outcome.state = BundleState::Archived;
        Processed::Committed(outcome)
    }

    /// Reads the committed entry's build stamp, if a parseable sidecar
    /// exists in the catalog.
    async fn committed_build(&self, entry_dir: &str) -> Option<BuildStamp> {
        let meta_path = CatalogPaths::meta_file(entry_dir);
        let bytes = self.catalog.get(&meta_path).await.ok()?;
        let meta: BundleMeta = serde_json::from_slice(&bytes).ok()?;
        BuildStamp::parse(&meta.build_time).ok()
    }
}
