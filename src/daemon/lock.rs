// src/daemon/lock.rs

//! Advisory file locks for the daemon and one-shot commands
//!
//! # Lock Strategy
//!
//! - **Lifetime Lock**: `daemon.lock` - held while the daemon runs, so only
//!   one daemon instance can exist. Its holder writes a `.pid` file.
//! - **State Lock**: `state.lock` - held around every operation that mutates
//!   the system or the manifest: each daemon cycle, and each `flatly add` /
//!   `flatly remove`. This keeps a one-shot command from racing a cycle that
//!   would otherwise see a half-applied change and undo it.
//!
//! # Example
//!
//! ```ignore
//! use flatly::daemon::lock::FileLock;
//!
//! let lock = FileLock::acquire(paths.state_lock())?;
//! // ... mutate state ...
//! // Lock automatically released on drop
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive `flock`-based lock on a file
///
/// Locks belong to the open file description, so two `FileLock`s on the same
/// path conflict even within one process.
pub struct FileLock {
    /// The lock file handle (kept open to maintain lock)
    #[allow(dead_code)]
    file: File,
    /// Path to the lock file
    path: PathBuf,
    /// Whether we wrote a .pid file that must be removed on drop
    wrote_pid: bool,
}

impl FileLock {
    /// Acquire an exclusive lock, blocking until available
    ///
    /// Use `try_acquire` for non-blocking behavior.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        file.lock_exclusive().map_err(|e| {
            Error::IoError(format!("Failed to acquire lock {}: {}", path.display(), e))
        })?;

        debug!("Acquired lock at {:?}", path);
        Ok(Self {
            file,
            path,
            wrote_pid: false,
        })
    }

    /// Try to acquire an exclusive lock without blocking
    ///
    /// Returns:
    /// - `Ok(Some(lock))` if lock was acquired
    /// - `Ok(None)` if lock is held by another holder
    /// - `Err` on I/O errors
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired lock at {:?}", path);
                Ok(Some(Self {
                    file,
                    path,
                    wrote_pid: false,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("Lock already held at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to try-acquire lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Check if a lock is currently held, without keeping it
    pub fn is_held<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();

        if !path.exists() {
            return false;
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return false,
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the PID recorded next to a lock, if any
    pub fn holder_pid<P: AsRef<Path>>(lock_path: P) -> Option<u32> {
        let pid_path = lock_path.as_ref().with_extension("pid");
        fs::read_to_string(&pid_path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Write our PID to the `.pid` file beside the lock
    pub fn write_pid(&mut self) -> Result<()> {
        let pid_path = self.path.with_extension("pid");
        fs::write(&pid_path, std::process::id().to_string())?;
        self.wrote_pid = true;
        info!("Wrote PID {} to {}", std::process::id(), pid_path.display());
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.wrote_pid {
            let _ = fs::remove_file(self.path.with_extension("pid"));
        }

        // Lock is released when the file is closed
        debug!("Released lock at {:?}", self.path);
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path).map_err(|e| {
        Error::IoError(format!("Failed to open lock file {}: {}", path.display(), e))
    })
}
