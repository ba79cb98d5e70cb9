// src/model/diff.rs

//! Diff computation between two package sets.
//!
//! The diff is a pure set difference in both directions, keyed on exact
//! package id. Packages present on both sides never appear in the delta.

use super::PackageSet;

/// The installs and removals needed to move from one set to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Packages in the new set but not the old one
    pub to_install: PackageSet,

    /// Packages in the old set but not the new one
    pub to_remove: PackageSet,
}

impl Delta {
    /// Check if no changes are needed
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }

    /// Count of packages touched by this delta
    pub fn change_count(&self) -> usize {
        self.to_install.len() + self.to_remove.len()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} to install, {} to remove",
            self.to_install.len(),
            self.to_remove.len()
        )
    }
}

/// Compute the delta from `previous` to `current`
///
/// `to_install = current - previous` and `to_remove = previous - current`,
/// so the two halves are always disjoint.
pub fn compute_diff(previous: &PackageSet, current: &PackageSet) -> Delta {
    Delta {
        to_install: current.difference(previous),
        to_remove: previous.difference(current),
    }
}
