// src/error.rs

//! Error types for flatly
//!
//! Errors fall into three groups: state file I/O, external tool invocation,
//! and configuration. Per-package tool failures during a reconciliation batch
//! are captured as outcomes instead of being propagated (see `reconcile`).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the flatly library
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    /// The state file exists but is not a JSON array of strings
    #[error("Corrupt state file {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("`{command}` failed with exit code {code}: {stderr}")]
    ToolFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    ToolTimeout { command: String, timeout: Duration },

    #[error("Invalid package name: {0:?}")]
    InvalidPackageName(String),

    /// A one-shot install/remove did not succeed
    #[error("Failed to {action} {package}: {reason}")]
    ActionFailed {
        action: String,
        package: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock is held by another process: {}", .0.display())]
    LockHeld(PathBuf),
}

impl Error {
    /// Whether this error came from the external package tool
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound(_)
                | Error::ToolFailed { .. }
                | Error::ToolTimeout { .. }
                | Error::InvalidPackageName(_)
                | Error::ActionFailed { .. }
        )
    }
}

/// Result type for flatly operations
pub type Result<T> = std::result::Result<T, Error>;
