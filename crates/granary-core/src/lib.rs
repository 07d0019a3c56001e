//! # granary-core
//!
//! Core abstractions for the Granary dataset catalog.
//!
//! This crate provides the foundational types used across all Granary
//! components:
//!
//! - **Partition Schema**: per-task partition dimensions and their allowed
//!   values, validated before any filesystem mutation
//! - **Canonical Paths**: the single source of truth for catalog, asset, and
//!   trash path construction
//! - **Build Stamps**: temporally ordered build timestamps for version
//!   selection
//! - **Storage Backends**: the async storage contract with local-filesystem
//!   and in-memory implementations
//! - **Error Types**: shared error definitions and result aliases
//!
//! ## Crate Boundary
//!
//! `granary-core` is the only crate allowed to define shared primitives.
//! The commit pipeline (`granary-catalog`) and the CLI build on the
//! contracts defined here.
//!
//! ## Example
//!
//! ```rust
//! use granary_core::partition::PartitionSchema;
//!
//! let schema = PartitionSchema::builtin();
//! let mut map = std::collections::BTreeMap::new();
//! map.insert("lang".to_string(), "ko".to_string());
//! map.insert("src".to_string(), "real".to_string());
//! assert!(schema.validate("ocr", &map).is_ok());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod build_stamp;
pub mod catalog_paths;
pub mod error;
pub mod local;
pub mod observability;
pub mod partition;
pub mod storage;

pub use build_stamp::BuildStamp;
pub use catalog_paths::CatalogPaths;
pub use error::{Error, Result};
pub use local::LocalBackend;
pub use partition::{parse_partition_string, DimensionValue, PartitionSchema};
pub use storage::{
    copy_object, CopyOutcome, MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition,
    WriteResult,
};
