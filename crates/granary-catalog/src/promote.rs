//! Safe promotion: copy-only transfer of a bundle into the catalog tree.
//!
//! Promotion never deletes or moves anything in staging; destructive
//! consumption happens only in the archivist, and only after the catalog
//! copy has been verified. The entry's tabular and metadata files are
//! overwritten unconditionally (a catalog entry always reflects the most
//! recent committed build for its key), while assets are copied
//! create-only: identical bytes never need re-copying, and a concurrent
//! duplicate attempt is a harmless no-op.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use granary_core::{
    CatalogPaths, CopyOutcome, StorageBackend, WritePrecondition, WriteResult,
};

use crate::bundle::{scan_rows, StagedBundle};
use crate::error::{CommitError, Result};
use crate::options::CommitOptions;

/// A per-asset copy failure; surfaced in the run summary, never aborting.
#[derive(Debug, Clone, Serialize)]
pub struct AssetFailure {
    /// The asset reference as stored in the row.
    pub reference: String,
    /// Why the copy failed.
    pub reason: String,
}

/// What promotion did (or, in dry-run, would have done) for one bundle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromotionReport {
    /// Catalog-relative entry directory.
    pub entry_dir: String,
    /// Catalog-relative path of the promoted tabular file.
    pub data_path: String,
    /// Catalog-relative path of the promoted sidecar.
    pub meta_path: String,
    /// Assets physically copied into the shared tree.
    pub assets_copied: u64,
    /// Assets already present at their content-addressed path.
    pub assets_deduplicated: u64,
    /// Per-asset failures; the bundle still commits.
    pub asset_failures: Vec<AssetFailure>,
    /// Human-readable planned actions (dry-run only).
    pub planned: Vec<String>,
}

/// Copies a selected bundle from staging into the catalog.
pub struct Promoter {
    staging: Arc<dyn StorageBackend>,
    catalog: Arc<dyn StorageBackend>,
}

impl Promoter {
    /// Creates a promoter over the staging and catalog backends.
    #[must_use]
    pub fn new(staging: Arc<dyn StorageBackend>, catalog: Arc<dyn StorageBackend>) -> Self {
        Self { staging, catalog }
    }

    /// Promotes a bundle into `entry_dir`.
    ///
    /// Copies the tabular file, then the sidecar, then every referenced
    /// asset. Tabular/sidecar copy failure aborts the bundle; per-asset
    /// failures are recorded in the report and do not.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Copy`] if the tabular or metadata file cannot
    /// be read from staging or written to the catalog.
    pub async fn promote(
        &self,
        bundle: &StagedBundle,
        entry_dir: &str,
        options: &CommitOptions,
    ) -> Result<PromotionReport> {
        let mut report = PromotionReport {
            entry_dir: entry_dir.to_string(),
            data_path: CatalogPaths::data_file(entry_dir, bundle.data_ext()),
            meta_path: CatalogPaths::meta_file(entry_dir),
            ..PromotionReport::default()
        };

        let data = self
            .staging
            .get(&bundle.data_path)
            .await
            .map_err(|e| CommitError::copy(&bundle.data_path, e.to_string()))?;
        let meta = self
            .staging
            .get(&bundle.meta_path)
            .await
            .map_err(|e| CommitError::copy(&bundle.meta_path, e.to_string()))?;

        let data_dst = report.data_path.clone();
        self.write(&data_dst, data.clone(), WritePrecondition::None, options, &mut report)
            .await
            .map_err(|e| CommitError::copy(&data_dst, e.to_string()))?;

        let meta_dst = report.meta_path.clone();
        self.write(&meta_dst, meta, WritePrecondition::None, options, &mut report)
            .await
            .map_err(|e| CommitError::copy(&meta_dst, e.to_string()))?;

        // Asset extraction is best-effort here; an unreadable tabular file
        // is the verifier's finding, not the promoter's.
        let refs = match scan_rows(&data) {
            Ok(scan) => scan.asset_refs,
            Err(e) => {
                tracing::warn!(
                    data = %bundle.data_path,
                    error = %e,
                    "could not scan rows for asset references"
                );
                Vec::new()
            }
        };

        for reference in refs {
            self.promote_asset(bundle, &reference, options, &mut report)
                .await;
        }

        tracing::info!(
            entry = %entry_dir,
            assets_copied = report.assets_copied,
            assets_deduplicated = report.assets_deduplicated,
            asset_failures = report.asset_failures.len(),
            dry_run = options.dry_run,
            "bundle promoted"
        );
        Ok(report)
    }

    /// Copies one referenced asset into the shared content-addressed tree.
    async fn promote_asset(
        &self,
        bundle: &StagedBundle,
        reference: &str,
        options: &CommitOptions,
        report: &mut PromotionReport,
    ) {
        let dst = match CatalogPaths::asset_path(
            &bundle.meta.provider,
            &bundle.meta.dataset,
            reference,
        ) {
            Ok(dst) => dst,
            Err(e) => {
                report.asset_failures.push(AssetFailure {
                    reference: reference.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        match self.catalog.head(&dst).await {
            Ok(Some(_)) => {
                report.assets_deduplicated += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                report.asset_failures.push(AssetFailure {
                    reference: reference.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        }

        let src = bundle.staging_asset_path(reference);
        let outcome = match self.staging.get(&src).await {
            Ok(data) => {
                self.write(&dst, data, WritePrecondition::DoesNotExist, options, report)
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(CopyOutcome::Copied) => report.assets_copied += 1,
            // Raced in by a concurrent copy of the same immutable content.
            Ok(CopyOutcome::AlreadyPresent) => report.assets_deduplicated += 1,
            Err(e) => {
                tracing::warn!(
                    asset = %reference,
                    destination = %dst,
                    error = %e,
                    "asset copy failed; bundle commit continues"
                );
                report.asset_failures.push(AssetFailure {
                    reference: reference.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// The single write seam for promotion.
    ///
    /// Dry-run is decided here and nowhere else, so both modes run the
    /// same decision logic above this point.
    async fn write(
        &self,
        to: &str,
        data: Bytes,
        precondition: WritePrecondition,
        options: &CommitOptions,
        report: &mut PromotionReport,
    ) -> granary_core::Result<CopyOutcome> {
        if options.dry_run {
            report
                .planned
                .push(format!("copy {} bytes to {to}", data.len()));
            return Ok(CopyOutcome::Copied);
        }
        match self.catalog.put(to, data, precondition).await? {
            WriteResult::Success { .. } => Ok(CopyOutcome::Copied),
            WriteResult::PreconditionFailed { .. } => Ok(CopyOutcome::AlreadyPresent),
        }
    }
}
