// src/packages/mock.rs

//! In-memory package manager for tests
//!
//! Keeps an installed set behind a mutex and records every mutating call, so
//! tests can assert both the end state and which tool actions were taken.

use crate::error::{Error, Result};
use crate::model::PackageSet;
use crate::packages::PackageManager;
use std::collections::HashSet;
use std::sync::Mutex;

/// A tool action recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Install(String),
    Uninstall(String),
}

#[derive(Debug, Default)]
struct MockState {
    installed: PackageSet,
    failing: HashSet<String>,
    list_fails: bool,
    calls: Vec<MockCall>,
}

/// Fake backend with scriptable failures
#[derive(Debug, Default)]
pub struct MockPackageManager {
    state: Mutex<MockState>,
}

impl MockPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given packages installed
    pub fn with_installed<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        mock.lock().installed = packages.into_iter().collect();
        mock
    }

    /// Make install/uninstall of `name` fail
    pub fn fail_on(&self, name: impl Into<String>) {
        self.lock().failing.insert(name.into());
    }

    /// Make `list_installed` fail (simulates flatpak being unavailable)
    pub fn set_list_fails(&self, fails: bool) {
        self.lock().list_fails = fails;
    }

    /// Install or remove a package behind flatly's back
    pub fn set_installed(&self, name: &str, installed: bool) {
        let mut state = self.lock();
        if installed {
            state.installed.insert(name);
        } else {
            state.installed.remove(name);
        }
    }

    /// Current installed set
    pub fn installed(&self) -> PackageSet {
        self.lock().installed.clone()
    }

    /// Mutating calls made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not cascade into every other assertion
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PackageManager for MockPackageManager {
    fn list_installed(&self) -> Result<PackageSet> {
        let state = self.lock();
        if state.list_fails {
            return Err(Error::ToolNotFound("mock flatpak unavailable".to_string()));
        }
        Ok(state.installed.clone())
    }

    fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.lock().installed.contains(name))
    }

    fn install(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Install(name.to_string()));
        if state.failing.contains(name) {
            return Err(Error::ToolFailed {
                command: format!("flatpak install {}", name),
                code: 1,
                stderr: format!("error: Nothing matches {}", name),
            });
        }
        state.installed.insert(name);
        Ok(())
    }

    fn uninstall(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Uninstall(name.to_string()));
        if state.failing.contains(name) {
            return Err(Error::ToolFailed {
                command: format!("flatpak uninstall {}", name),
                code: 1,
                stderr: format!("error: {} not installed", name),
            });
        }
        state.installed.remove(name);
        Ok(())
    }
}
