// src/model/store.rs

//! Persistent storage for package sets.
//!
//! A `StateStore` owns one JSON file holding a sorted array of package ids.
//! Writes go through a temp file in the same directory followed by a rename,
//! so a crash mid-write leaves either the old or the new file, never a
//! truncated one. A file that exists but fails to parse is a hard error: an
//! unreadable manifest must never be mistaken for an empty one, since that
//! would uninstall everything.

use crate::error::{Error, Result};
use crate::model::PackageSet;
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// File name of the declared package set
pub const ACTIVE_FILE_NAME: &str = "active.json";

/// File name of the installed set recorded after each reconciliation
pub const OBSERVED_FILE_NAME: &str = "observed.json";

/// Prefix of timestamped backup files
pub const BACKUP_PREFIX: &str = "active_backup_";

/// Timestamp format embedded in backup names (sorts chronologically)
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Suffixed names tried when a backup name is already taken
const MAX_BACKUP_ATTEMPTS: usize = 100;

/// Mode of every file we write, matching what a user-created file would get
#[cfg(unix)]
const STATE_FILE_MODE: u32 = 0o644;

/// Reads and writes a package set at a fixed path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl StateStore {
    /// Create a store for `path`, with backups in a sibling `backups/` dir
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let backup_dir = path
            .parent()
            .unwrap_or(Path::new("."))
            .join("backups");
        Self { path, backup_dir }
    }

    /// Override the backup directory
    pub fn with_backup_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Read the stored set
    ///
    /// Returns `(set, true)` when the file exists and parses, `(empty,
    /// false)` when it does not exist. An empty or whitespace-only file is
    /// read as the empty set.
    pub fn read(&self) -> Result<(PackageSet, bool)> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("State file {} does not exist yet", self.path.display());
                return Ok((PackageSet::new(), false));
            }
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok((PackageSet::new(), true));
        }

        let set: PackageSet =
            serde_json::from_str(&content).map_err(|e| Error::CorruptState {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "Read {} packages from {}",
            set.len(),
            self.path.display()
        );
        Ok((set, true))
    }

    /// Write the set, creating parent directories as needed
    pub fn write(&self, set: &PackageSet) -> Result<()> {
        write_set_atomic(&self.path, set)?;
        debug!("Wrote {} packages to {}", set.len(), self.path.display());
        Ok(())
    }

    /// Write a timestamped snapshot of `set` into the backup directory
    ///
    /// Never replaces an existing backup: a name taken within the same
    /// millisecond gets a `_NN` suffix, which still sorts after it.
    pub fn backup(&self, set: &PackageSet) -> Result<PathBuf> {
        let timestamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut tmp = stage_set(&self.backup_dir, set)?;

        for attempt in 0..MAX_BACKUP_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}{}.json", BACKUP_PREFIX, timestamp)
            } else {
                format!("{}{}_{:02}.json", BACKUP_PREFIX, timestamp, attempt)
            };
            let backup_path = self.backup_dir.join(name);

            match tmp.persist_noclobber(&backup_path) {
                Ok(_) => {
                    info!("Backup created: {}", backup_path.display());
                    return Ok(backup_path);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
                Err(e) => {
                    return Err(Error::IoError(format!(
                        "Failed to write {}: {}",
                        backup_path.display(),
                        e.error
                    )));
                }
            }
        }

        Err(Error::IoError(format!(
            "No free backup name for {} in {}",
            timestamp,
            self.backup_dir.display()
        )))
    }

    /// List backups, oldest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json") {
                backups.push(entry.path());
            }
        }

        // Names embed a sortable timestamp, so lexical order is chronological
        backups.sort();
        Ok(backups)
    }

    /// Delete all but the newest `keep` backups, returning how many were removed
    ///
    /// `keep == 0` disables pruning.
    pub fn prune_backups(&self, keep: usize) -> Result<usize> {
        if keep == 0 {
            return Ok(0);
        }

        let backups = self.list_backups()?;
        if backups.len() <= keep {
            return Ok(0);
        }

        let excess = backups.len() - keep;
        for old in &backups[..excess] {
            fs::remove_file(old).map_err(|e| {
                Error::IoError(format!("Failed to remove backup {}: {}", old.display(), e))
            })?;
            debug!("Pruned backup {}", old.display());
        }

        Ok(excess)
    }
}

/// Serialize `set` as a four-space indented JSON array and rename it into place
fn write_set_atomic(path: &Path, set: &PackageSet) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp = stage_set(parent, set)?;
    tmp.persist(path).map_err(|e| {
        Error::IoError(format!("Failed to write {}: {}", path.display(), e.error))
    })?;

    Ok(())
}

/// Write `set` to a synced temp file in `dir`, ready to be renamed
fn stage_set(dir: &Path, set: &PackageSet) -> Result<NamedTempFile> {
    fs::create_dir_all(dir).map_err(|e| {
        Error::IoError(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    set.serialize(&mut serializer)
        .map_err(|e| Error::IoError(format!("Failed to serialize package set: {}", e)))?;
    buf.push(b'\n');

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&buf)?;

    // Temp files are created 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(STATE_FILE_MODE))?;
    }

    tmp.as_file().sync_all()?;
    Ok(tmp)
}
