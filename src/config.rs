// src/config.rs

//! Daemon configuration (`config.toml`)
//!
//! Every key is optional; a missing file means all defaults.
//!
//! ```toml
//! interval = "30s"
//! command_timeout = "10m"
//!
//! [flatpak]
//! binary = "flatpak"
//! installation = "user"
//! remote = "flathub"
//!
//! [backup]
//! enabled = true
//! keep = 20
//! ```

use crate::error::{Error, Result};
use crate::packages::{FlatpakCli, Installation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlatlyConfig {
    /// Time between reconciliation cycles
    pub interval: String,

    /// Upper bound on a single flatpak invocation
    pub command_timeout: String,

    pub flatpak: FlatpakConfig,

    pub backup: BackupConfig,
}

impl Default for FlatlyConfig {
    fn default() -> Self {
        Self {
            interval: "30s".to_string(),
            command_timeout: "10m".to_string(),
            flatpak: FlatpakConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

/// How to invoke flatpak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlatpakConfig {
    /// Binary name or path
    pub binary: String,

    /// `user` or `system`; flatpak's own default when unset
    pub installation: Option<Installation>,

    /// Remote passed to `flatpak install`
    pub remote: Option<String>,
}

impl Default for FlatpakConfig {
    fn default() -> Self {
        Self {
            binary: "flatpak".to_string(),
            installation: None,
            remote: None,
        }
    }
}

/// Manifest backup policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    pub enabled: bool,

    /// Number of backups to retain (0 = keep all)
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep: 20,
        }
    }
}

impl FlatlyConfig {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.interval()?;
        self.command_timeout()?;
        if self.flatpak.binary.trim().is_empty() {
            return Err(Error::Config("flatpak.binary must not be empty".to_string()));
        }
        Ok(())
    }

    /// Tick interval; never zero
    pub fn interval(&self) -> Result<Duration> {
        let interval = parse_duration(&self.interval)?;
        if interval.is_zero() {
            return Err(Error::Config("interval must be greater than zero".to_string()));
        }
        Ok(interval)
    }

    pub fn command_timeout(&self) -> Result<Duration> {
        let timeout = parse_duration(&self.command_timeout)?;
        if timeout.is_zero() {
            return Err(Error::Config(
                "command_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(timeout)
    }

    /// Build the flatpak backend described by this config
    pub fn package_manager(&self) -> Result<FlatpakCli> {
        Ok(FlatpakCli::new()
            .with_binary(&self.flatpak.binary)
            .with_installation(self.flatpak.installation)
            .with_remote(self.flatpak.remote.clone())
            .with_timeout(self.command_timeout()?))
    }
}

/// Parse a duration string like "30s", "10m", "6h", "1d", "1w"
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Config("Empty duration".to_string()));
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = s
            .parse()
            .map_err(|_| Error::Config(format!("Invalid duration number: {}", s)))?;
        return Ok(Duration::from_secs(secs));
    }

    let (idx, unit) = s
        .char_indices()
        .last()
        .ok_or_else(|| Error::Config("Empty duration".to_string()))?;
    let num_str = &s[..idx];
    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::Config(format!("Invalid duration number: {}", num_str)))?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => {
            return Err(Error::Config(format!("Invalid duration unit: {}", unit)));
        }
    };

    num.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("Duration too large: {}", s)))
}
