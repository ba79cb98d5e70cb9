// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flatly::packages::MockPackageManager;
use flatly::{FlatlyPaths, PackageSet, Reconciler};
use std::sync::Arc;
use tempfile::TempDir;

/// Build a package set from string literals
pub fn set(items: &[&str]) -> PackageSet {
    items.iter().copied().collect()
}

/// A reconciler rooted in a fresh temp directory, backed by a mock
///
/// Keep the TempDir alive for as long as the reconciler is used.
pub struct TestEnv {
    pub dir: TempDir,
    pub mock: Arc<MockPackageManager>,
    pub reconciler: Arc<Reconciler>,
}

impl TestEnv {
    pub fn new(installed: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPackageManager::with_installed(installed.iter().copied()));
        let reconciler = Arc::new(Reconciler::new(FlatlyPaths::new(dir.path()), mock.clone()));
        Self {
            dir,
            mock,
            reconciler,
        }
    }

    pub fn paths(&self) -> &FlatlyPaths {
        self.reconciler.paths()
    }

    /// Overwrite the manifest as a user editing it by hand would
    pub fn write_manifest(&self, contents: &str) {
        std::fs::write(self.paths().active_file(), contents).unwrap();
    }

    pub fn declared(&self) -> PackageSet {
        let (declared, existed) = self.reconciler.declared_store().read().unwrap();
        assert!(existed, "manifest should exist");
        declared
    }
}
