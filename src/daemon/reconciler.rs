// src/daemon/reconciler.rs

//! State-mutating operations shared by the daemon and the one-shot commands
//!
//! `active.json` is the declared set and is authoritative. The live flatpak
//! listing is the observed set. A cycle always moves observed toward
//! declared, never the reverse. The one-shot `add`/`remove` commands change
//! the system first and then refresh the declared set from it, so after they
//! finish the two agree and the next cycle has nothing to do.
//!
//! After every change the installed set is also written to `observed.json`,
//! which `flatly status` reports as the last reconciled set.

use crate::config::BackupConfig;
use crate::daemon::lock::FileLock;
use crate::error::{Error, Result};
use crate::model::{Delta, PackageSet, StateStore};
use crate::packages::PackageManager;
use crate::paths::FlatlyPaths;
use crate::reconcile::{AppliedResult, Outcome, PackageAction, PackageOutcome, ReconcileEngine};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Where the daemon is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonPhase {
    /// Seeding `active.json` from the installed set
    Bootstrapping,
    /// Waiting for the next tick
    Idle,
    /// Applying a delta
    Reconciling,
}

impl fmt::Display for DaemonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrapping => write!(f, "bootstrapping"),
            Self::Idle => write!(f, "idle"),
            Self::Reconciling => write!(f, "reconciling"),
        }
    }
}

/// Why a cycle did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A one-shot command holds the state lock
    LockBusy,
    /// `active.json` lists no packages
    EmptyManifest,
    /// Flatpak reports nothing installed
    NothingInstalled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockBusy => write!(f, "state lock is held by another command"),
            Self::EmptyManifest => write!(f, "manifest is empty, refusing to remove everything"),
            Self::NothingInstalled => write!(f, "no installed applications reported"),
        }
    }
}

/// What a single daemon cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// First run: `active.json` was created from the installed set
    Bootstrapped { packages: usize },
    Skipped(SkipReason),
    /// Declared and installed sets already agree
    InSync,
    Reconciled { delta: Delta, result: AppliedResult },
}

impl CycleReport {
    /// Emit the report through tracing
    pub fn log(&self) {
        match self {
            Self::Bootstrapped { packages } => {
                info!("Created manifest with {} installed packages", packages)
            }
            Self::Skipped(SkipReason::LockBusy) => debug!("Cycle skipped: {}", SkipReason::LockBusy),
            Self::Skipped(reason) => warn!("Cycle skipped: {}", reason),
            Self::InSync => debug!("System is in sync with manifest"),
            Self::Reconciled { result, .. } if result.has_failures() => {
                for failure in result.failures() {
                    warn!(
                        "Could not {} {}: {}",
                        failure.action, failure.package, failure.outcome
                    );
                }
                warn!("Cycle finished with failures ({}), will retry", result.summary());
            }
            Self::Reconciled { result, .. } => info!("Cycle finished: {}", result.summary()),
        }
    }
}

/// Result of a one-shot `add` or `remove`
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotReport {
    pub outcome: PackageOutcome,
    /// The refreshed declared set
    pub declared: PackageSet,
}

/// Snapshot of declared vs installed, for `flatly status`
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// `None` before the first bootstrap
    pub declared: Option<PackageSet>,
    pub installed: PackageSet,
    /// Installed set recorded by the last cycle or one-shot command
    pub last_reconciled: Option<PackageSet>,
    /// What the next cycle would do
    pub pending: Delta,
    pub daemon_pid: Option<u32>,
    pub daemon_running: bool,
}

/// Owns the state stores and the package manager for every entry point
pub struct Reconciler {
    paths: FlatlyPaths,
    manager: Arc<dyn PackageManager>,
    declared: StateStore,
    observed: StateStore,
    backup: BackupConfig,
    phase: Mutex<DaemonPhase>,
}

impl Reconciler {
    pub fn new(paths: FlatlyPaths, manager: Arc<dyn PackageManager>) -> Self {
        let declared = StateStore::new(paths.active_file()).with_backup_dir(paths.backup_dir());
        let observed = StateStore::new(paths.observed_file());
        Self {
            paths,
            manager,
            declared,
            observed,
            backup: BackupConfig::default(),
            phase: Mutex::new(DaemonPhase::Idle),
        }
    }

    /// Set the manifest backup policy
    pub fn with_backup(mut self, backup: BackupConfig) -> Self {
        self.backup = backup;
        self
    }

    pub fn paths(&self) -> &FlatlyPaths {
        &self.paths
    }

    pub fn declared_store(&self) -> &StateStore {
        &self.declared
    }

    pub fn observed_store(&self) -> &StateStore {
        &self.observed
    }

    pub fn phase(&self) -> DaemonPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_phase(&self, phase: DaemonPhase) {
        let mut current = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        if *current != phase {
            debug!("Daemon phase: {} -> {}", *current, phase);
            *current = phase;
        }
    }

    /// Run one reconciliation cycle
    ///
    /// Skips (rather than waits) when a one-shot command holds the state lock.
    /// Errors abort this cycle only; the daemon retries on the next tick.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let _lock = match FileLock::try_acquire(self.paths.state_lock())? {
            Some(lock) => lock,
            None => return Ok(CycleReport::Skipped(SkipReason::LockBusy)),
        };

        let (declared, existed) = self.read_declared()?;
        if !existed {
            self.set_phase(DaemonPhase::Bootstrapping);
            let result = self.bootstrap_locked();
            self.set_phase(DaemonPhase::Idle);
            return result.map(|packages| CycleReport::Bootstrapped { packages });
        }

        let installed = self.manager.list_installed()?;

        if declared.is_empty() {
            return Ok(CycleReport::Skipped(SkipReason::EmptyManifest));
        }
        if installed.is_empty() {
            return Ok(CycleReport::Skipped(SkipReason::NothingInstalled));
        }

        let engine = ReconcileEngine::new(self.manager.as_ref());
        let delta = engine.diff(&installed, &declared);
        if delta.is_empty() {
            return Ok(CycleReport::InSync);
        }

        self.set_phase(DaemonPhase::Reconciling);
        let result = self.reconcile_locked(&engine, &declared, delta);
        self.set_phase(DaemonPhase::Idle);
        result
    }

    fn reconcile_locked(
        &self,
        engine: &ReconcileEngine<'_>,
        declared: &PackageSet,
        delta: Delta,
    ) -> Result<CycleReport> {
        info!("Reconciling manifest: {}", delta.summary());
        self.backup_declared(declared);

        let result = engine.apply(&delta);

        let after = self.manager.list_installed()?;
        self.observed.write(&after)?;

        Ok(CycleReport::Reconciled { delta, result })
    }

    /// Write the installed set as the initial manifest; caller holds the lock
    fn bootstrap_locked(&self) -> Result<usize> {
        info!(
            "No manifest at {}, creating it from installed applications",
            self.declared.path().display()
        );
        let installed = self.manager.list_installed()?;
        self.declared.write(&installed)?;
        self.observed.write(&installed)?;
        Ok(installed.len())
    }

    /// Install `name` now and refresh the manifest from the system
    pub fn add(&self, name: &str) -> Result<OneShotReport> {
        let _lock = FileLock::acquire(self.paths.state_lock())?;
        let name = self.manager.canonical_name(name);
        let engine = ReconcileEngine::new(self.manager.as_ref());
        let outcome = engine.install_one(&name);
        self.finish_one_shot(outcome)
    }

    /// Uninstall `name` now and refresh the manifest from the system
    pub fn remove(&self, name: &str) -> Result<OneShotReport> {
        let _lock = FileLock::acquire(self.paths.state_lock())?;
        let name = self.manager.canonical_name(name);
        let engine = ReconcileEngine::new(self.manager.as_ref());
        let outcome = engine.remove_one(&name);
        self.finish_one_shot(outcome)
    }

    fn finish_one_shot(&self, outcome: PackageOutcome) -> Result<OneShotReport> {
        if let Outcome::Failed(reason) = &outcome.outcome {
            return Err(Error::ActionFailed {
                action: outcome.action.to_string(),
                package: outcome.package.clone(),
                reason: reason.clone(),
            });
        }

        let (previous, existed) = self.declared.read()?;
        let installed = self.manager.list_installed()?;

        if existed && previous != installed {
            self.backup_declared(&previous);
        }
        self.declared.write(&installed)?;
        self.observed.write(&installed)?;

        let verb = match outcome.action {
            PackageAction::Install => "installed",
            PackageAction::Remove => "removed",
        };
        info!(
            "{} {}; manifest updated with {} packages",
            outcome.package,
            verb,
            installed.len()
        );

        Ok(OneShotReport {
            outcome,
            declared: installed,
        })
    }

    /// Compare the manifest with the system without changing anything
    pub fn status(&self) -> Result<StatusReport> {
        let (declared, existed) = self.read_declared()?;
        let installed = self.manager.list_installed()?;
        let last_reconciled = match self.observed.read() {
            Ok((set, true)) => Some(set),
            Ok((_, false)) => None,
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", self.observed.path().display(), e);
                None
            }
        };

        let pending = if existed {
            ReconcileEngine::new(self.manager.as_ref()).diff(&installed, &declared)
        } else {
            Delta::default()
        };

        let daemon_lock = self.paths.daemon_lock();
        let daemon_running = FileLock::is_held(&daemon_lock);
        let daemon_pid = if daemon_running {
            FileLock::holder_pid(&daemon_lock)
        } else {
            None
        };

        Ok(StatusReport {
            declared: existed.then_some(declared),
            installed,
            last_reconciled,
            pending,
            daemon_pid,
            daemon_running,
        })
    }

    /// Read the manifest with every entry in the form the backend reports
    fn read_declared(&self) -> Result<(PackageSet, bool)> {
        let (raw, existed) = self.declared.read()?;
        let declared: PackageSet = raw
            .iter()
            .map(|name| self.manager.canonical_name(name))
            .collect();
        if declared != raw {
            debug!("Normalized manifest entries to application ids");
        }
        Ok((declared, existed))
    }

    /// Back up the manifest; failures are logged and never fatal
    fn backup_declared(&self, declared: &PackageSet) {
        if !self.backup.enabled {
            return;
        }

        if let Err(e) = self.declared.backup(declared) {
            warn!("Error creating backup: {}", e);
            return;
        }

        match self.declared.prune_backups(self.backup.keep) {
            Ok(0) => {}
            Ok(n) => debug!("Pruned {} old backups", n),
            Err(e) => warn!("Error pruning backups: {}", e),
        }
    }
}
