//! Bundle discovery: staging scan and version selection.
//!
//! Scans the staging root for sidecar/tabular pairs, groups them by
//! logical dataset key, and keeps only the newest build per key. Malformed
//! bundles are skipped with a warning and reported in the run summary;
//! discovery never fails the run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use granary_core::{BuildStamp, CatalogPaths, StorageBackend};

use crate::bundle::{BundleMeta, DatasetKey, StagedBundle};
use crate::error::Result;

/// A bundle excluded from the run at discovery time.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedBundle {
    /// Staging-relative path of the sidecar (or tabular file) involved.
    pub path: String,
    /// Human-readable skip reason.
    pub reason: String,
}

/// Result of one staging scan.
#[derive(Debug, Default)]
pub struct DiscoveredBundles {
    /// Newest bundle per logical dataset key.
    pub selected: BTreeMap<DatasetKey, StagedBundle>,
    /// Bundles excluded with a logged warning.
    pub skipped: Vec<SkippedBundle>,
}

/// Scans a staging root for committable bundles.
pub struct Discovery {
    staging: Arc<dyn StorageBackend>,
}

impl Discovery {
    /// Creates a discovery scanner over a staging backend.
    #[must_use]
    pub fn new(staging: Arc<dyn StorageBackend>) -> Self {
        Self { staging }
    }

    /// Enumerates the staging root and selects the newest bundle per key.
    ///
    /// A bundle exists only where a `_meta.json` sidecar and a `data.<ext>`
    /// file sit side by side; a tabular file with no sidecar is ignored
    /// silently, a sidecar with no tabular file (or with unparseable
    /// contents) is skipped with a warning. When multiple bundles share a
    /// key, the greatest build stamp wins; ties keep the first bundle in
    /// sorted-path order, so selection is deterministic regardless of
    /// filesystem enumeration order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the staging root cannot be listed or a
    /// sidecar that exists cannot be read.
    pub async fn discover(&self) -> Result<DiscoveredBundles> {
        let mut objects = self.staging.list("").await?;
        objects.sort_by(|a, b| a.path.cmp(&b.path));

        // First data.<ext> per directory, in sorted order.
        let mut data_by_dir: HashMap<&str, &str> = HashMap::new();
        for object in &objects {
            let (dir, name) = split_path(&object.path);
            if name
                .strip_prefix(CatalogPaths::DATA_STEM)
                .is_some_and(|rest| rest.starts_with('.'))
            {
                data_by_dir.entry(dir).or_insert(&object.path);
            }
        }

        let mut out = DiscoveredBundles::default();
        for object in &objects {
            let (dir, name) = split_path(&object.path);
            if name != CatalogPaths::META_FILE {
                continue;
            }

            let Some(data_path) = data_by_dir.get(dir) else {
                tracing::warn!(path = %object.path, "sidecar has no tabular file; skipping");
                out.skipped.push(SkippedBundle {
                    path: object.path.clone(),
                    reason: "no tabular file next to sidecar".to_string(),
                });
                continue;
            };

            let bytes = self.staging.get(&object.path).await?;
            let meta: BundleMeta = match serde_json::from_slice(&bytes) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(path = %object.path, error = %e, "unparseable sidecar; skipping");
                    out.skipped.push(SkippedBundle {
                        path: object.path.clone(),
                        reason: format!("unparseable sidecar: {e}"),
                    });
                    continue;
                }
            };

            let build_stamp = match BuildStamp::parse(&meta.build_time) {
                Ok(stamp) => stamp,
                Err(e) => {
                    tracing::warn!(path = %object.path, error = %e, "invalid build_time; skipping");
                    out.skipped.push(SkippedBundle {
                        path: object.path.clone(),
                        reason: format!("invalid build_time: {e}"),
                    });
                    continue;
                }
            };

            let key = meta.key();
            let bundle = StagedBundle {
                data_path: (*data_path).to_string(),
                meta_path: object.path.clone(),
                meta,
                build_stamp,
            };

            match out.selected.get(&key) {
                // Strictly greater wins; a tie keeps the first-seen bundle.
                Some(existing) if bundle.build_stamp <= existing.build_stamp => {
                    tracing::debug!(
                        key = %key,
                        superseded = %bundle.meta_path,
                        "older or tied bundle discarded from consideration"
                    );
                }
                _ => {
                    out.selected.insert(key, bundle);
                }
            }
        }

        tracing::info!(
            selected = out.selected.len(),
            skipped = out.skipped.len(),
            "staging discovery complete"
        );
        Ok(out)
    }
}

/// Splits a root-relative path into `(dir, file_name)`.
fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').map_or(("", path), |(d, n)| (d, n))
}
