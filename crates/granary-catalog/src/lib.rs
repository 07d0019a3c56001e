//! Staging-to-catalog commit pipeline for dataset bundles.
//!
//! A staged bundle is a data file plus a `_meta.json` sidecar dropped
//! anywhere under a staging root by an upstream build. This crate
//! discovers those bundles, selects the newest build per dataset key,
//! copies them into the immutable catalog layout, verifies the catalog
//! copy, and relocates the consumed staging inputs to a trash root.
//! Nothing is ever deleted outright and the staging inputs survive
//! untouched until their catalog copy has been verified.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod archive;
pub mod bundle;
pub mod discovery;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod promote;
pub mod verify;

pub use archive::Archivist;
pub use bundle::{scan_rows, BundleMeta, DatasetKey, RowScan, StagedBundle};
pub use discovery::{DiscoveredBundles, Discovery, SkippedBundle};
pub use error::{CommitError, Result};
pub use options::{CommitOptions, MissingAssetPolicy};
pub use orchestrator::{BundleOutcome, BundleState, CommitPipeline, CommitSummary};
pub use promote::{AssetFailure, PromotionReport, Promoter};
pub use verify::{Verifier, VerifyReport};
