// src/packages/mod.rs

//! Package manager backends
//!
//! Flatly never installs anything itself. Every change goes through a
//! `PackageManager`, which wraps an external tool. The production backend
//! drives the `flatpak` CLI; `mock` provides an in-memory backend for tests.

pub mod flatpak;
pub mod mock;

pub use flatpak::{FlatpakCli, Installation, app_id_from_ref};
pub use mock::MockPackageManager;

use crate::error::Result;
use crate::model::PackageSet;

/// Interface to the external package manager
///
/// Implementations must be usable from the daemon's blocking worker thread,
/// hence `Send + Sync`.
pub trait PackageManager: Send + Sync {
    /// Query the set of currently installed packages
    fn list_installed(&self) -> Result<PackageSet>;

    /// Map a manifest entry to the name `list_installed` reports for it
    fn canonical_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// Check whether a single package is installed
    fn is_installed(&self, name: &str) -> Result<bool>;

    /// Install a package
    fn install(&self, name: &str) -> Result<()>;

    /// Uninstall a package
    fn uninstall(&self, name: &str) -> Result<()>;
}
