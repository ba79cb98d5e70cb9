// src/model/mod.rs

//! Declared Package Model
//!
//! The model is the set of Flatpak application ids the user wants present.
//! It lives in `active.json` as a plain JSON array, which the user edits by
//! hand (or through `flatly add` / `flatly remove`). The daemon compares it
//! with what Flatpak reports as installed and converges the system.
//!
//! # Example active.json
//!
//! ```json
//! [
//!     "org.gnome.Maps",
//!     "org.mozilla.firefox"
//! ]
//! ```

mod diff;
mod store;

pub use diff::{Delta, compute_diff};
pub use store::{ACTIVE_FILE_NAME, BACKUP_PREFIX, OBSERVED_FILE_NAME, StateStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An unordered set of package identifiers
///
/// Backed by a `BTreeSet` so serialization is always sorted, which keeps the
/// manifest and its backups stable under diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageSet(BTreeSet<String>);

impl PackageSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert a package, returning false if it was already present
    pub fn insert(&mut self, package: impl Into<String>) -> bool {
        self.0.insert(package.into())
    }

    /// Remove a package, returning false if it was not present
    pub fn remove(&mut self, package: &str) -> bool {
        self.0.remove(package)
    }

    pub fn contains(&self, package: &str) -> bool {
        self.0.contains(package)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate packages in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    /// Packages in `self` that are not in `other`
    pub fn difference(&self, other: &PackageSet) -> PackageSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Packages present in both sets
    pub fn intersection(&self, other: &PackageSet) -> PackageSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }
}

impl<S: Into<String>> FromIterator<S> for PackageSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for PackageSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PackageSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
