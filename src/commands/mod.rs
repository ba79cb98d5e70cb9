// src/commands/mod.rs
//! Command handlers for the flatly CLI

mod daemon;
mod package;
mod status;

pub use daemon::cmd_daemon;
pub use package::{cmd_add, cmd_remove};
pub use status::cmd_status;

use anyhow::{Context, Result};
use flatly::{FlatlyConfig, FlatlyPaths, Reconciler};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resolved state directory plus its `config.toml`
pub struct Session {
    pub paths: FlatlyPaths,
    pub config: FlatlyConfig,
}

impl Session {
    /// Resolve the state directory and load its configuration
    pub fn open(debug: bool, config_dir: Option<&Path>) -> Result<Self> {
        let paths = FlatlyPaths::resolve(debug, config_dir)?;
        paths.ensure_root()?;
        debug!("Using state directory {}", paths.root().display());

        let config = FlatlyConfig::load(&paths.config_file())
            .with_context(|| format!("Failed to load {}", paths.config_file().display()))?;

        Ok(Self { paths, config })
    }

    /// Build a reconciler backed by the flatpak CLI
    pub fn reconciler(&self) -> Result<Reconciler> {
        let manager = self
            .config
            .package_manager()
            .context("Invalid flatpak settings")?;

        Ok(Reconciler::new(self.paths.clone(), Arc::new(manager))
            .with_backup(self.config.backup.clone()))
    }
}
