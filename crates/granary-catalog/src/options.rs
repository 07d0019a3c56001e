//! Commit options threaded through every mutating operation.

use std::time::Duration;

/// Policy for assets referenced by a committed record but missing on disk.
///
/// The origin system treats missing individual assets as recoverable
/// data-quality noise; [`MissingAssetPolicy::Reject`] promotes them to an
/// integrity failure for deployments that cannot tolerate unreadable rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingAssetPolicy {
    /// Report missing assets as warnings; the bundle still commits.
    #[default]
    Warn,
    /// Fail verification when any referenced asset is missing.
    Reject,
}

/// Options for a commit run.
///
/// `dry_run` is a capability flag consulted by the lowest-level write
/// helpers in promotion and archival, not a separate code path: dry and
/// live runs exercise identical decision logic, with dry runs recording
/// human-readable planned actions instead of mutating anything.
#[derive(Debug, Clone)]
pub struct CommitOptions {
    /// When set, no filesystem mutation occurs anywhere in the run.
    pub dry_run: bool,
    /// Policy for missing referenced assets during verification.
    pub missing_assets: MissingAssetPolicy,
    /// Per-bundle processing deadline.
    ///
    /// One corrupt or oversized input must not stall the whole run; a
    /// bundle exceeding the deadline fails with a timeout and the run
    /// continues.
    pub bundle_deadline: Duration,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            missing_assets: MissingAssetPolicy::default(),
            bundle_deadline: Duration::from_secs(600),
        }
    }
}

impl CommitOptions {
    /// Creates options for a dry run.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Sets the missing-asset policy.
    #[must_use]
    pub fn with_missing_assets(mut self, policy: MissingAssetPolicy) -> Self {
        self.missing_assets = policy;
        self
    }

    /// Sets the per-bundle deadline.
    #[must_use]
    pub fn with_bundle_deadline(mut self, deadline: Duration) -> Self {
        self.bundle_deadline = deadline;
        self
    }
}
