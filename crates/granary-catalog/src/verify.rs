//! Integrity verification of promoted catalog entries.
//!
//! Verification runs strictly after promotion, against the catalog copies,
//! so a failure leaves the staging originals untouched and the bundle
//! naturally retryable on the next run. In dry-run the catalog copy was
//! never written, so the same checks run against the staging copy instead.

use std::sync::Arc;

use serde::Serialize;

use granary_core::{CatalogPaths, StorageBackend};

use crate::bundle::{scan_rows, StagedBundle};
use crate::error::{CommitError, Result};
use crate::options::MissingAssetPolicy;
use crate::promote::PromotionReport;

/// Outcome of verifying one catalog entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    /// Rows parsed from the tabular file.
    pub rows: u64,
    /// Distinct asset references checked for presence.
    pub assets_checked: u64,
    /// References that did not resolve to an existing asset.
    pub missing_assets: Vec<String>,
}

/// Verifies promoted entries before staging inputs are consumed.
pub struct Verifier {
    staging: Arc<dyn StorageBackend>,
    catalog: Arc<dyn StorageBackend>,
}

impl Verifier {
    /// Creates a verifier over the staging and catalog backends.
    #[must_use]
    pub fn new(staging: Arc<dyn StorageBackend>, catalog: Arc<dyn StorageBackend>) -> Self {
        Self { staging, catalog }
    }

    /// Verifies the catalog copy produced by a live promotion.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Integrity`] if the entry's tabular or
    /// metadata file is missing, a row fails to parse, or (under
    /// [`MissingAssetPolicy::Reject`]) any referenced asset is absent.
    pub async fn verify_catalog(
        &self,
        bundle: &StagedBundle,
        promotion: &PromotionReport,
        policy: MissingAssetPolicy,
    ) -> Result<VerifyReport> {
        if self.catalog.head(&promotion.meta_path).await?.is_none() {
            return Err(CommitError::integrity(format!(
                "catalog sidecar missing: {}",
                promotion.meta_path
            )));
        }
        let data = self.catalog.get(&promotion.data_path).await.map_err(|e| {
            CommitError::integrity(format!(
                "catalog tabular file unreadable: {}: {e}",
                promotion.data_path
            ))
        })?;

        self.check_rows(bundle, &data, policy, false).await
    }

    /// Verifies the staging copy during a dry run.
    ///
    /// Asset references count as present if they exist in the catalog
    /// asset tree or next to the staged bundle, since a live run would
    /// have copied the latter.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::verify_catalog`], evaluated against the
    /// staging copy.
    pub async fn verify_staged(
        &self,
        bundle: &StagedBundle,
        policy: MissingAssetPolicy,
    ) -> Result<VerifyReport> {
        if self.staging.head(&bundle.meta_path).await?.is_none() {
            return Err(CommitError::integrity(format!(
                "staging sidecar missing: {}",
                bundle.meta_path
            )));
        }
        let data = self.staging.get(&bundle.data_path).await.map_err(|e| {
            CommitError::integrity(format!(
                "staging tabular file unreadable: {}: {e}",
                bundle.data_path
            ))
        })?;

        self.check_rows(bundle, &data, policy, true).await
    }

    async fn check_rows(
        &self,
        bundle: &StagedBundle,
        data: &[u8],
        policy: MissingAssetPolicy,
        include_staging: bool,
    ) -> Result<VerifyReport> {
        let scan = scan_rows(data)?;
        let mut report = VerifyReport {
            rows: scan.rows,
            ..VerifyReport::default()
        };

        for reference in &scan.asset_refs {
            report.assets_checked += 1;
            if self
                .asset_present(bundle, reference, include_staging)
                .await?
            {
                continue;
            }
            tracing::warn!(
                key = %bundle.meta.key(),
                asset = %reference,
                "referenced asset missing"
            );
            report.missing_assets.push(reference.clone());
        }

        if policy == MissingAssetPolicy::Reject && !report.missing_assets.is_empty() {
            return Err(CommitError::integrity(format!(
                "{} referenced asset(s) missing",
                report.missing_assets.len()
            )));
        }
        Ok(report)
    }

    async fn asset_present(
        &self,
        bundle: &StagedBundle,
        reference: &str,
        include_staging: bool,
    ) -> Result<bool> {
        let Ok(catalog_path) = CatalogPaths::asset_path(
            &bundle.meta.provider,
            &bundle.meta.dataset,
            reference,
        ) else {
            return Ok(false);
        };
        if self.catalog.head(&catalog_path).await?.is_some() {
            return Ok(true);
        }
        if include_staging {
            let staged = bundle.staging_asset_path(reference);
            return Ok(self.staging.head(&staged).await?.is_some());
        }
        Ok(false)
    }
}
