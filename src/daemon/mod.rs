// src/daemon/mod.rs

//! Flatly daemon - periodic manifest reconciliation
//!
//! The daemon wakes every `interval`, runs one reconciliation cycle and goes
//! back to sleep. A cycle runs on tokio's blocking pool because every step
//! shells out to flatpak or touches the filesystem.
//!
//! ```text
//!   ┌──────────────┐  no manifest   ┌───────────────┐
//!   │  tick (sleep)├───────────────►│ Bootstrapping │
//!   └──────┬───────┘                └───────┬───────┘
//!          │ manifest present               │
//!          ▼                                ▼
//!   ┌──────────────┐  delta empty   ┌───────────────┐
//!   │ Reconciling  ├───────────────►│     Idle      │
//!   └──────────────┘                └───────────────┘
//! ```
//!
//! # Shutdown
//!
//! Cancellation is only observed between cycles. A cycle that has started is
//! allowed to finish, so the manifest and the system are never left mid-way.
//!
//! # Module Structure
//!
//! - `lock` - flock-based daemon and state locks
//! - `reconciler` - cycle, bootstrap, one-shot add/remove, status

pub mod lock;
pub mod reconciler;

use crate::config::FlatlyConfig;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use lock::FileLock;
pub use reconciler::{
    CycleReport, DaemonPhase, OneShotReport, Reconciler, SkipReason, StatusReport,
};

/// Default time between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Daemon loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Time between cycles
    pub interval: Duration,
    /// Run a single cycle and exit
    pub once: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            once: false,
        }
    }
}

impl DaemonConfig {
    /// Take the interval from `config.toml`
    pub fn from_config(config: &FlatlyConfig) -> Result<Self> {
        Ok(Self {
            interval: config.interval()?,
            once: false,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }
}

/// Run the reconciliation loop until `shutdown` is cancelled
///
/// Fails immediately with `LockHeld` if another daemon owns the state
/// directory. Cycle errors are logged and retried on the next tick.
pub async fn run_daemon(
    reconciler: Arc<Reconciler>,
    config: DaemonConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("Starting flatly daemon version {}", env!("CARGO_PKG_VERSION"));

    let lock_path = reconciler.paths().daemon_lock();
    let mut daemon_lock =
        FileLock::try_acquire(&lock_path)?.ok_or_else(|| Error::LockHeld(lock_path.clone()))?;
    daemon_lock.write_pid()?;

    info!(
        "Watching {} every {:?}",
        reconciler.declared_store().path().display(),
        config.interval
    );

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let worker = reconciler.clone();
        match tokio::task::spawn_blocking(move || worker.run_cycle()).await {
            Ok(Ok(report)) => report.log(),
            Ok(Err(e)) if e.is_tool_error() => {
                warn!("Cannot query flatpak, retrying next cycle: {}", e)
            }
            Ok(Err(e)) => error!("Reconciliation cycle failed: {}", e),
            Err(e) => error!("Reconciliation task panicked: {}", e),
        }

        if config.once {
            break;
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    info!("Daemon stopped");
    drop(daemon_lock);
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM
pub fn shutdown_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, finishing current cycle");
        token.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
