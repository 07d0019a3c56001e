//! Local filesystem storage backend.
//!
//! Backs one Granary root (staging, catalog, or trash) with a directory
//! tree. Paths handed to the backend are root-relative and `/`-separated;
//! absolute paths and traversal components are rejected so a backend can
//! never write outside its root.
//!
//! Writes go through a temporary file in the destination directory followed
//! by a rename, so a crash mid-write never leaves a half-written object at
//! a canonical path. Temporary files are invisible to `list`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend, WritePrecondition, WriteResult};

/// Prefix of in-flight temporary files, skipped by `list`.
const TMP_PREFIX: &str = ".granary-tmp-";

/// Storage backend over a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Creates a backend rooted at `root`.
    ///
    /// The directory does not need to exist yet; it is created on first
    /// write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the backend's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a root-relative object path, rejecting escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() {
            return Err(Error::InvalidInput("object path cannot be empty".into()));
        }
        if path.starts_with('/') || path.contains('\\') {
            return Err(Error::InvalidInput(format!(
                "object path must be relative with '/' separators: {path:?}"
            )));
        }
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "object path escapes the root: {path:?}"
                    )));
                }
            }
        }
        Ok(self.root.join(relative))
    }

    /// Builds a version token from filesystem metadata.
    fn version_token(meta: &std::fs::Metadata) -> String {
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos());
        format!("{modified}-{}", meta.len())
    }

    fn object_meta(path: &str, meta: &std::fs::Metadata) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: meta.len(),
            version: Self::version_token(meta),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object not found: {path}")))
            }
            Err(e) => Err(Error::storage_with_source(format!("read failed: {path}"), e)),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let full = self.resolve(path)?;

        let current = self.head(path).await?;
        match &precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(meta) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: meta.version,
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => match current {
                Some(meta) if &meta.version != expected => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: meta.version,
                    });
                }
                None => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: "0".to_string(),
                    });
                }
                _ => {}
            },
            WritePrecondition::None => {}
        }

        let parent = full
            .parent()
            .ok_or_else(|| Error::InvalidInput(format!("object path has no parent: {path:?}")))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::storage_with_source(format!("mkdir failed for {path}"), e))?;

        // Write-then-rename keeps the canonical path either absent or complete.
        let tmp = parent.join(format!("{TMP_PREFIX}{}", ulid::Ulid::new()));
        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage_with_source(
                format!("write failed: {path}"),
                e,
            ));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage_with_source(
                format!("rename failed: {path}"),
                e,
            ));
        }

        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| Error::storage_with_source(format!("stat failed: {path}"), e))?;
        Ok(WriteResult::Success {
            version: Self::version_token(&meta),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_with_source(
                format!("delete failed: {path}"),
                e,
            )),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut results = Vec::new();
        if !self.root.exists() {
            return Ok(results);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::storage_with_source(
                        format!("list failed under {}", dir.display()),
                        e,
                    ));
                }
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::storage_with_source("directory iteration failed", e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Error::storage_with_source("stat failed during list", e))?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }

                let name = entry.file_name();
                if name.to_string_lossy().starts_with(TMP_PREFIX) {
                    continue;
                }

                let full = entry.path();
                let Ok(relative) = full.strip_prefix(&self.root) else {
                    continue;
                };
                let rel_path = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !rel_path.starts_with(prefix) {
                    continue;
                }

                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| Error::storage_with_source("stat failed during list", e))?;
                results.push(Self::object_meta(&rel_path, &meta));
            }
        }
        Ok(results)
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(Some(Self::object_meta(path, &meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_with_source(format!("stat failed: {path}"), e)),
        }
    }
}
