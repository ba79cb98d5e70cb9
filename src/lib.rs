// src/lib.rs

//! Flatly - declarative Flatpak application manager
//!
//! Keeps the set of installed Flatpak applications in line with a JSON
//! manifest (`active.json`). Edit the manifest and the daemon installs or
//! uninstalls applications until the system matches it.
//!
//! # Architecture
//!
//! - Manifest-first: `active.json` is the declared set and always wins
//! - Stateless engine: `ReconcileEngine` turns a diff into flatpak calls
//! - Per-package isolation: one failed install never blocks the rest
//! - Atomic state: every state file is replaced via rename, never rewritten

pub mod config;
pub mod daemon;
mod error;
pub mod model;
pub mod packages;
pub mod paths;
pub mod reconcile;

pub use config::FlatlyConfig;
pub use daemon::{CycleReport, DaemonConfig, Reconciler, run_daemon};
pub use error::{Error, Result};
pub use model::{Delta, PackageSet, StateStore, compute_diff};
pub use packages::{FlatpakCli, PackageManager};
pub use paths::FlatlyPaths;
pub use reconcile::{AppliedResult, Outcome, ReconcileEngine};
