//! Canonical storage paths for the Granary catalog.
//!
//! This module is the **single source of truth** for all catalog, asset,
//! and trash paths. All writers must use these functions to construct
//! paths. No hardcoded path strings should exist outside this module.
//!
//! # Path Layout
//!
//! ```text
//! catalog-root/
//! ├── provider={provider}/dataset={dataset}/
//! │   ├── task={task}/variant={variant}/{dim}={value}/…/
//! │   │   ├── data.{ext}
//! │   │   └── _meta.json
//! │   └── images/
//! │       └── {hash[0:2]}/
//! │           └── {hash}.{ext}
//! trash-root/
//! └── {original-name}.{YYYYMMDDHHMMSS}[.{n}]
//! ```
//!
//! Entry directories use the task's declared dimension order; asset files
//! are content-addressed and bucketed by the first two characters of their
//! hash to bound directory fan-out.

use crate::error::{Error, Result};
use crate::partition::DimensionValue;

/// Canonical path generator for catalog storage.
///
/// All paths are relative to their root (catalog or trash) and use `/`
/// separators regardless of platform; the storage backends own the mapping
/// to real filesystem paths.
///
/// # Example
///
/// ```
/// use granary_core::catalog_paths::CatalogPaths;
///
/// assert_eq!(CatalogPaths::META_FILE, "_meta.json");
/// assert_eq!(
///     CatalogPaths::assets_dir("aihub", "office_docs").unwrap(),
///     "provider=aihub/dataset=office_docs/images/"
/// );
/// ```
pub struct CatalogPaths;

impl CatalogPaths {
    /// File stem of the tabular data file in every bundle and catalog entry.
    pub const DATA_STEM: &'static str = "data";

    /// File name of the metadata sidecar in every bundle and catalog entry.
    pub const META_FILE: &'static str = "_meta.json";

    /// Directory name of the shared per-provider/dataset asset tree.
    pub const ASSETS_DIR: &'static str = "images";

    /// Returns the catalog entry directory for a logical dataset key.
    ///
    /// `dimensions` must already be in the task's declared order (see
    /// [`crate::partition::PartitionSchema::ordered_values`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any segment value is empty or
    /// contains path separators, `=`, or control characters.
    pub fn entry_dir(
        provider: &str,
        dataset: &str,
        task: &str,
        variant: &str,
        dimensions: &[DimensionValue],
    ) -> Result<String> {
        Self::validate_segment(provider, "provider")?;
        Self::validate_segment(dataset, "dataset")?;
        Self::validate_segment(task, "task")?;
        Self::validate_segment(variant, "variant")?;

        let mut dir =
            format!("provider={provider}/dataset={dataset}/task={task}/variant={variant}");
        for dim in dimensions {
            Self::validate_segment(dim.value(), dim.name())?;
            dir.push('/');
            dir.push_str(&dim.to_string());
        }
        Ok(dir)
    }

    /// Returns the tabular data file path inside an entry directory.
    #[must_use]
    pub fn data_file(entry_dir: &str, ext: &str) -> String {
        format!("{entry_dir}/{}.{ext}", Self::DATA_STEM)
    }

    /// Returns the metadata sidecar path inside an entry directory.
    #[must_use]
    pub fn meta_file(entry_dir: &str) -> String {
        format!("{entry_dir}/{}", Self::META_FILE)
    }

    /// Returns the shared asset directory for a provider/dataset pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if provider or dataset is not a
    /// valid path segment.
    pub fn assets_dir(provider: &str, dataset: &str) -> Result<String> {
        Self::validate_segment(provider, "provider")?;
        Self::validate_segment(dataset, "dataset")?;
        Ok(format!(
            "provider={provider}/dataset={dataset}/{}/",
            Self::ASSETS_DIR
        ))
    }

    /// Returns the canonical asset path for a content-addressed reference.
    ///
    /// `reference` is the value stored in a tabular row, e.g.
    /// `images/3f/3fa4…9c.png` or a bare `3fa4…9c.png`; only its file name
    /// is significant. The file stem is the content hash, and the first two
    /// characters of the hash select the bucket directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the reference has no file name,
    /// or its stem does not start with two ASCII characters.
    pub fn asset_path(provider: &str, dataset: &str, reference: &str) -> Result<String> {
        let file_name = reference
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::InvalidInput(format!("asset reference has no file name: {reference:?}"))
            })?;
        let stem = file_name.split('.').next().unwrap_or(file_name);
        if stem.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "asset hash too short in reference {reference:?}"
            )));
        }
        // Row content is producer-supplied; a multibyte stem must not slice
        // mid-character.
        let bucket = stem.get(..2).ok_or_else(|| {
            Error::InvalidInput(format!(
                "asset hash must start with two ASCII characters in reference {reference:?}"
            ))
        })?;
        Ok(format!(
            "provider={provider}/dataset={dataset}/{}/{bucket}/{file_name}",
            Self::ASSETS_DIR
        ))
    }

    /// Returns the trash name for an archived staging file.
    ///
    /// `stamp` is the commit timestamp in `YYYYMMDDHHMMSS` form.
    #[must_use]
    pub fn trash_name(file_name: &str, stamp: &str) -> String {
        format!("{file_name}.{stamp}")
    }

    /// Returns a disambiguated trash name for collision `n` (1-based).
    ///
    /// Used when [`Self::trash_name`] already exists in the trash root;
    /// archived entries are never overwritten.
    #[must_use]
    pub fn trash_name_seq(file_name: &str, stamp: &str, n: u32) -> String {
        format!("{file_name}.{stamp}.{n}")
    }

    /// Validates a single `key=value` path segment value.
    fn validate_segment(value: &str, field: &str) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidInput(format!("{field} cannot be empty")));
        }
        if value.contains('/') || value.contains('\\') {
            return Err(Error::InvalidInput(format!(
                "{field} cannot contain path separators: {value:?}"
            )));
        }
        if value.contains('=') || value.contains(',') {
            return Err(Error::InvalidInput(format!(
                "{field} cannot contain '=' or ',': {value:?}"
            )));
        }
        if value.chars().any(char::is_control) {
            return Err(Error::InvalidInput(format!(
                "{field} cannot contain control characters"
            )));
        }
        if value == "." || value == ".." {
            return Err(Error::InvalidInput(format!(
                "{field} cannot be a relative path component"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionSchema;
    use std::collections::BTreeMap;

    fn ocr_dims() -> Vec<DimensionValue> {
        let schema = PartitionSchema::builtin();
        let mut map = BTreeMap::new();
        map.insert("lang".to_string(), "ko".to_string());
        map.insert("src".to_string(), "real".to_string());
        schema.ordered_values("ocr", &map).unwrap()
    }

    #[test]
    fn test_entry_dir_layout() {
        let dir = CatalogPaths::entry_dir("aihub", "office_docs", "ocr", "base", &ocr_dims())
            .unwrap();
        assert_eq!(
            dir,
            "provider=aihub/dataset=office_docs/task=ocr/variant=base/lang=ko/src=real"
        );
    }

    #[test]
    fn test_entry_files() {
        let dir = "provider=aihub/dataset=office_docs/task=ocr/variant=base/lang=ko/src=real";
        assert_eq!(
            CatalogPaths::data_file(dir, "jsonl"),
            format!("{dir}/data.jsonl")
        );
        assert_eq!(CatalogPaths::meta_file(dir), format!("{dir}/_meta.json"));
    }

    #[test]
    fn test_asset_path_buckets_by_hash_prefix() {
        let path =
            CatalogPaths::asset_path("aihub", "office_docs", "images/3f/3fa4b1c2.png").unwrap();
        assert_eq!(
            path,
            "provider=aihub/dataset=office_docs/images/3f/3fa4b1c2.png"
        );
        // Bare file names resolve to the same canonical location.
        assert_eq!(
            CatalogPaths::asset_path("aihub", "office_docs", "3fa4b1c2.png").unwrap(),
            path
        );
    }

    #[test]
    fn test_asset_path_rejects_degenerate_references() {
        assert!(CatalogPaths::asset_path("p", "d", "images/3f/").is_err());
        assert!(CatalogPaths::asset_path("p", "d", "a.png").is_err());
    }

    #[test]
    fn test_asset_path_rejects_multibyte_stem_without_panicking() {
        // The stem passes a byte-length check but has no two-character
        // ASCII prefix to bucket under.
        let result = CatalogPaths::asset_path("p", "d", "日本.png");
        assert!(result.is_err());
        let result = CatalogPaths::asset_path("p", "d", "images/3f/日本.png");
        assert!(result.is_err());
    }

    #[test]
    fn test_trash_names() {
        assert_eq!(
            CatalogPaths::trash_name("data.jsonl", "20250115103000"),
            "data.jsonl.20250115103000"
        );
        assert_eq!(
            CatalogPaths::trash_name_seq("data.jsonl", "20250115103000", 2),
            "data.jsonl.20250115103000.2"
        );
    }

    #[test]
    fn test_segment_validation_rejects_traversal() {
        assert!(CatalogPaths::entry_dir("..", "d", "ocr", "base", &ocr_dims()).is_err());
        assert!(CatalogPaths::entry_dir("a/b", "d", "ocr", "base", &ocr_dims()).is_err());
        assert!(CatalogPaths::entry_dir("a=b", "d", "ocr", "base", &ocr_dims()).is_err());
        assert!(CatalogPaths::entry_dir("", "d", "ocr", "base", &ocr_dims()).is_err());
    }
}
