// src/paths.rs
//! Centralized path derivation for flatly's state directory

use crate::error::{Error, Result};
use crate::model::{ACTIVE_FILE_NAME, OBSERVED_FILE_NAME};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name under the user's config home
pub const APP_DIR_NAME: &str = "flatly";

/// Environment variable overriding the state directory
pub const CONFIG_DIR_ENV: &str = "FLATLY_CONFIG_DIR";

/// Locations of every file flatly reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatlyPaths {
    root: PathBuf,
}

impl FlatlyPaths {
    /// Use `root` directly as the state directory
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the state directory
    ///
    /// Precedence: explicit override, then `FLATLY_CONFIG_DIR`, then the
    /// current directory in debug mode, then `<config-home>/flatly`.
    pub fn resolve(debug: bool, override_dir: Option<&Path>) -> Result<Self> {
        Self::resolve_with(debug, override_dir, std::env::var_os(CONFIG_DIR_ENV))
    }

    fn resolve_with(
        debug: bool,
        override_dir: Option<&Path>,
        env_dir: Option<OsString>,
    ) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Ok(Self::new(dir));
        }

        if let Some(dir) = env_dir.filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }

        if debug {
            let cwd = std::env::current_dir().map_err(|e| {
                Error::Config(format!("Cannot determine current directory: {}", e))
            })?;
            return Ok(Self::new(cwd));
        }

        dirs::config_dir()
            .map(|dir| Self::new(dir.join(APP_DIR_NAME)))
            .ok_or_else(|| {
                Error::Config("Cannot determine the user's configuration directory".to_string())
            })
    }

    /// Create the state directory if missing
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            Error::Config(format!(
                "Cannot create state directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The declared package set (`active.json`)
    pub fn active_file(&self) -> PathBuf {
        self.root.join(ACTIVE_FILE_NAME)
    }

    /// Installed set recorded after the last reconciliation
    pub fn observed_file(&self) -> PathBuf {
        self.root.join(OBSERVED_FILE_NAME)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Held for the daemon's lifetime
    pub fn daemon_lock(&self) -> PathBuf {
        self.root.join("daemon.lock")
    }

    /// Held around every state-mutating operation
    pub fn state_lock(&self) -> PathBuf {
        self.root.join("state.lock")
    }
}
