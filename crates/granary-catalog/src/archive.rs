//! Archival of consumed staging inputs.
//!
//! After a bundle's catalog copy has been verified, its staging tabular
//! and sidecar files are relocated into the trash root under
//! `<name>.<commit-stamp>`. Nothing is ever deleted outright: the trash
//! copy is written first (create-only, never overwriting an earlier
//! archive), and the staging original is removed only after that copy
//! succeeds. A failed archival leaves extra staging data behind, which is
//! safe; the catalog entry is already committed.

use std::sync::Arc;

use granary_core::{
    copy_object, CatalogPaths, CopyOutcome, StorageBackend, WritePrecondition,
};

use crate::error::{CommitError, Result};
use crate::options::CommitOptions;

/// Upper bound on collision disambiguation attempts for one trash name.
const MAX_COLLISIONS: u32 = 100;

/// Relocates consumed staging files into the trash root.
pub struct Archivist {
    staging: Arc<dyn StorageBackend>,
    trash: Arc<dyn StorageBackend>,
}

impl Archivist {
    /// Creates an archivist over the staging and trash backends.
    #[must_use]
    pub fn new(staging: Arc<dyn StorageBackend>, trash: Arc<dyn StorageBackend>) -> Self {
        Self { staging, trash }
    }

    /// Archives one staging file under the given commit stamp
    /// (`YYYYMMDDHHMMSS`).
    ///
    /// Returns the trash-relative path of the archived copy. On name
    /// collision a numeric disambiguator is appended; existing trash
    /// entries are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Archive`] if the staging file cannot be
    /// read, the trash copy cannot be written, or the staging delete
    /// fails after a successful copy.
    pub async fn archive(
        &self,
        path: &str,
        stamp: &str,
        options: &CommitOptions,
    ) -> Result<String> {
        let file_name = path.rsplit('/').next().unwrap_or(path);

        for attempt in 0..MAX_COLLISIONS {
            let candidate = if attempt == 0 {
                CatalogPaths::trash_name(file_name, stamp)
            } else {
                CatalogPaths::trash_name_seq(file_name, stamp, attempt)
            };

            if options.dry_run {
                if self
                    .trash
                    .head(&candidate)
                    .await
                    .map_err(|e| CommitError::archive(path, e.to_string()))?
                    .is_some()
                {
                    continue;
                }
                tracing::info!(from = %path, to = %candidate, "dry-run: would archive");
                return Ok(candidate);
            }

            let outcome = copy_object(
                self.staging.as_ref(),
                path,
                self.trash.as_ref(),
                &candidate,
                WritePrecondition::DoesNotExist,
            )
            .await
            .map_err(|e| CommitError::archive(path, e.to_string()))?;

            match outcome {
                CopyOutcome::AlreadyPresent => continue,
                CopyOutcome::Copied => {
                    self.staging
                        .delete(path)
                        .await
                        .map_err(|e| CommitError::archive(path, e.to_string()))?;
                    tracing::info!(from = %path, to = %candidate, "staging file archived");
                    return Ok(candidate);
                }
            }
        }

        Err(CommitError::archive(
            path,
            format!("no free trash name after {MAX_COLLISIONS} attempts"),
        ))
    }
}
