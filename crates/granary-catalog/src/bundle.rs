//! Staged bundle types: the logical dataset key, the metadata sidecar,
//! and tabular row scanning.
//!
//! A bundle is one build of one dataset slice: a JSON-lines tabular file
//! (`data.<ext>`) with a sibling `_meta.json` sidecar. The sidecar's
//! required fields identify the slice; arbitrary producer-supplied fields
//! are preserved verbatim through promotion.

use serde::{Deserialize, Serialize};

use granary_core::BuildStamp;

use crate::error::{CommitError, Result};

/// Row columns treated as content-addressed asset references.
pub const ASSET_COLUMNS: &[&str] = &["image", "image_path", "asset_path"];

/// Logical dataset key: identifies one committable dataset slice across
/// versions.
///
/// Two bundles with the same key are versions of the same slice; only the
/// newest by build stamp is eligible for commit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DatasetKey {
    /// Data provider (e.g. `aihub`).
    pub provider: String,
    /// Dataset name within the provider.
    pub dataset: String,
    /// Dataset task (e.g. `ocr`).
    pub task: String,
    /// Dataset variant (e.g. `base`).
    pub variant: String,
    /// Raw partition string as recorded by the producer.
    pub partitions: String,
}

impl std::fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}[{}]",
            self.provider, self.dataset, self.task, self.variant, self.partitions
        )
    }
}

/// Metadata sidecar (`_meta.json`) written by a producer next to the
/// tabular file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Data provider.
    pub provider: String,
    /// Dataset name.
    pub dataset: String,
    /// Dataset task.
    pub task: String,
    /// Dataset variant.
    pub variant: String,
    /// Partition string, `k1=v1,k2=v2`.
    #[serde(default)]
    pub partitions: String,
    /// Build timestamp string; compared temporally for version selection.
    pub build_time: String,
    /// Arbitrary producer-supplied fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BundleMeta {
    /// Returns the logical dataset key for this sidecar.
    #[must_use]
    pub fn key(&self) -> DatasetKey {
        DatasetKey {
            provider: self.provider.clone(),
            dataset: self.dataset.clone(),
            task: self.task.clone(),
            variant: self.variant.clone(),
            partitions: self.partitions.clone(),
        }
    }
}

/// A discovered staging bundle selected for commit consideration.
#[derive(Debug, Clone)]
pub struct StagedBundle {
    /// Staging-relative path of the tabular file.
    pub data_path: String,
    /// Staging-relative path of the metadata sidecar.
    pub meta_path: String,
    /// Parsed sidecar contents.
    pub meta: BundleMeta,
    /// Parsed build timestamp.
    pub build_stamp: BuildStamp,
}

impl StagedBundle {
    /// Returns the bundle's directory within the staging root.
    #[must_use]
    pub fn dir(&self) -> &str {
        self.data_path
            .rsplit_once('/')
            .map_or("", |(dir, _)| dir)
    }

    /// Returns the tabular file's extension (`jsonl` for `data.jsonl`).
    #[must_use]
    pub fn data_ext(&self) -> &str {
        self.data_path
            .rsplit('/')
            .next()
            .and_then(|name| name.split_once('.'))
            .map_or("jsonl", |(_, ext)| ext)
    }

    /// Resolves an asset reference relative to the bundle's staging
    /// directory.
    #[must_use]
    pub fn staging_asset_path(&self, reference: &str) -> String {
        let dir = self.dir();
        if dir.is_empty() {
            reference.to_string()
        } else {
            format!("{dir}/{reference}")
        }
    }
}

/// Summary of one pass over a tabular file's rows.
#[derive(Debug, Clone, Default)]
pub struct RowScan {
    /// Number of rows scanned.
    pub rows: u64,
    /// Asset references found, in row order, deduplicated.
    pub asset_refs: Vec<String>,
}

/// Scans JSON-lines tabular data, collecting asset references.
///
/// Every non-empty line must parse as a JSON object. References are taken
/// from [`ASSET_COLUMNS`] string cells and deduplicated preserving first
/// occurrence.
///
/// # Errors
///
/// Returns [`CommitError::Integrity`] naming the offending line number if
/// a line is not a JSON object.
pub fn scan_rows(data: &[u8]) -> Result<RowScan> {
    let text = std::str::from_utf8(data)
        .map_err(|_| CommitError::integrity("tabular file is not valid UTF-8"))?;

    let mut scan = RowScan::default();
    let mut seen = std::collections::HashSet::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            CommitError::integrity(format!("row {} is not valid JSON: {e}", idx + 1))
        })?;
        let Some(object) = value.as_object() else {
            return Err(CommitError::integrity(format!(
                "row {} is not a JSON object",
                idx + 1
            )));
        };
        scan.rows += 1;

        for column in ASSET_COLUMNS {
            if let Some(reference) = object.get(*column).and_then(serde_json::Value::as_str) {
                if !reference.is_empty() && seen.insert(reference.to_string()) {
                    scan.asset_refs.push(reference.to_string());
                }
            }
        }
    }
    Ok(scan)
}
