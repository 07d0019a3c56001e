//! Error types for the commit pipeline.
//!
//! The taxonomy maps directly onto the pipeline stages: schema violations
//! stop a bundle before any mutation, copy failures abort a bundle's
//! promotion, integrity failures abort its archival, and archive failures
//! are logged with the catalog entry already committed. Discovery problems
//! are warnings (skipped bundles), never errors.

use thiserror::Error;

/// Result type alias for commit pipeline operations.
pub type Result<T> = std::result::Result<T, CommitError>;

/// Errors that can occur while committing a bundle.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The bundle's partition key violated the partition schema.
    ///
    /// Raised before any filesystem mutation.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the schema violation.
        message: String,
    },

    /// Copying the tabular or metadata file into the catalog failed.
    ///
    /// Aborts the bundle's commit; staging is left untouched for retry.
    #[error("copy error for {path}: {message}")]
    Copy {
        /// The path that failed to copy.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// Post-promotion verification of the catalog copy failed.
    ///
    /// Aborts archival for the bundle only; staging originals are
    /// preserved, making the failure retryable on the next run.
    #[error("integrity error: {message}")]
    Integrity {
        /// Description of the verification failure.
        message: String,
    },

    /// Relocating a consumed staging file into the trash failed.
    ///
    /// The catalog entry remains committed; leaving extra staging data is
    /// safe, unlike leaving a half-committed catalog entry.
    #[error("archive error for {path}: {message}")]
    Archive {
        /// The staging path that failed to archive.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// The bundle exceeded its processing deadline.
    #[error("bundle timed out after {seconds}s")]
    Timeout {
        /// The configured deadline in seconds.
        seconds: u64,
    },

    /// A storage operation failed outside a more specific stage.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },
}

impl CommitError {
    /// Creates an integrity error with the given message.
    #[must_use]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Creates a copy error for a path.
    #[must_use]
    pub fn copy(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Copy {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an archive error for a path.
    #[must_use]
    pub fn archive(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<granary_core::Error> for CommitError {
    fn from(err: granary_core::Error) -> Self {
        match err {
            granary_core::Error::Schema { message } => Self::Schema { message },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}
