//! Error types and result aliases for Granary.
//!
//! This module defines the shared error types used across all Granary
//! components. Errors are structured for programmatic handling and include
//! context for manual recovery.

/// The result type used throughout granary-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core Granary operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A partition key violated the partition schema.
    ///
    /// Raised before any filesystem mutation; fatal to the bundle being
    /// validated, never to the run.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the schema violation.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A timestamp string could not be parsed into a build stamp.
    #[error("invalid build time {value:?}: {message}")]
    InvalidBuildTime {
        /// The raw timestamp string.
        value: String,
        /// Description of the parse failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new schema error with the given message.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
