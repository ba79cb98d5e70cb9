// src/reconcile/mod.rs

//! Reconciliation engine
//!
//! Turns a `Delta` into package manager calls. Every package is handled on
//! its own: presence is checked first (so applying the same delta twice is a
//! no-op), and a failure is recorded as that package's outcome without
//! stopping the rest of the batch.
//!
//! The engine never touches persisted state. Callers read the store, hand a
//! snapshot to the engine, and write the store afterwards.

use crate::model::{Delta, PackageSet, compute_diff};
use crate::packages::PackageManager;
use std::fmt;
use tracing::{info, warn};

/// Which way a package is being moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Remove,
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Result of handling a single package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed,
    Removed,
    /// Install requested but the package was already there
    SkippedAlreadyPresent,
    /// Removal requested but the package was already gone
    SkippedAlreadyAbsent,
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Whether the package manager actually changed something
    pub fn is_change(&self) -> bool {
        matches!(self, Outcome::Installed | Outcome::Removed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::Removed => write!(f, "removed"),
            Self::SkippedAlreadyPresent => write!(f, "already installed, skipped"),
            Self::SkippedAlreadyAbsent => write!(f, "not installed, skipped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome for one package in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub package: String,
    pub action: PackageAction,
    pub outcome: Outcome,
}

/// Per-package outcomes of applying a delta, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedResult {
    pub outcomes: Vec<PackageOutcome>,
}

impl AppliedResult {
    /// Look up the outcome for a package
    pub fn get(&self, package: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.package == package)
            .map(|o| &o.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.outcomes.iter().filter(|o| o.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Count of packages actually installed or removed
    pub fn changed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_change()).count()
    }

    /// True when nothing was changed and nothing failed
    pub fn is_noop(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| !o.outcome.is_change() && !o.outcome.is_failure())
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let failed = self.failures().count();
        let skipped = self.outcomes.len() - self.changed_count() - failed;
        format!(
            "{} changed, {} skipped, {} failed",
            self.changed_count(),
            skipped,
            failed
        )
    }
}

/// Applies deltas through a `PackageManager`
pub struct ReconcileEngine<'a> {
    manager: &'a dyn PackageManager,
}

impl<'a> ReconcileEngine<'a> {
    pub fn new(manager: &'a dyn PackageManager) -> Self {
        Self { manager }
    }

    /// Compute the delta from `previous` to `current`
    pub fn diff(&self, previous: &PackageSet, current: &PackageSet) -> Delta {
        compute_diff(previous, current)
    }

    /// Apply a delta: removals first, then installs
    pub fn apply(&self, delta: &Delta) -> AppliedResult {
        let mut result = AppliedResult::default();

        for package in delta.to_remove.iter() {
            info!("Package removed from manifest: {}", package);
            result.outcomes.push(self.remove_one(package));
        }

        for package in delta.to_install.iter() {
            info!("Package added to manifest: {}", package);
            result.outcomes.push(self.install_one(package));
        }

        if result.has_failures() {
            warn!("Reconciliation finished with failures: {}", result.summary());
        } else {
            info!("Reconciliation finished: {}", result.summary());
        }

        result
    }

    /// Install a single package unless it is already present
    pub fn install_one(&self, package: &str) -> PackageOutcome {
        let outcome = match self.manager.is_installed(package) {
            Ok(true) => {
                info!("{} is already installed, skipping", package);
                Outcome::SkippedAlreadyPresent
            }
            Ok(false) => match self.manager.install(package) {
                Ok(()) => Outcome::Installed,
                Err(e) => {
                    warn!("Failed to install {}: {}", package, e);
                    Outcome::Failed(e.to_string())
                }
            },
            Err(e) => {
                warn!("Could not check whether {} is installed: {}", package, e);
                Outcome::Failed(e.to_string())
            }
        };

        PackageOutcome {
            package: package.to_string(),
            action: PackageAction::Install,
            outcome,
        }
    }

    /// Remove a single package if it is present
    pub fn remove_one(&self, package: &str) -> PackageOutcome {
        let outcome = match self.manager.is_installed(package) {
            Ok(false) => {
                info!("{} is not installed, skipping", package);
                Outcome::SkippedAlreadyAbsent
            }
            Ok(true) => match self.manager.uninstall(package) {
                Ok(()) => Outcome::Removed,
                Err(e) => {
                    warn!("Failed to uninstall {}: {}", package, e);
                    Outcome::Failed(e.to_string())
                }
            },
            Err(e) => {
                warn!("Could not check whether {} is installed: {}", package, e);
                Outcome::Failed(e.to_string())
            }
        };

        PackageOutcome {
            package: package.to_string(),
            action: PackageAction::Remove,
            outcome,
        }
    }
}
