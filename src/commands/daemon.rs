// src/commands/daemon.rs
//! Daemon command

use super::Session;
use anyhow::{Context, Result};
use flatly::config::parse_duration;
use flatly::daemon::{DaemonConfig, run_daemon, shutdown_on_signal};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the reconciliation loop in the foreground
pub fn cmd_daemon(session: &Session, interval: Option<&str>, once: bool) -> Result<()> {
    let mut config = DaemonConfig::from_config(&session.config)?.with_once(once);
    if let Some(interval) = interval {
        let interval =
            parse_duration(interval).with_context(|| format!("Invalid interval: {}", interval))?;
        if interval.is_zero() {
            anyhow::bail!("Interval must be greater than zero");
        }
        config = config.with_interval(interval);
    }

    let reconciler = Arc::new(session.reconciler()?);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    rt.block_on(async move {
        let shutdown = CancellationToken::new();
        shutdown_on_signal(shutdown.clone());
        run_daemon(reconciler, config, shutdown).await
    })
    .context("Daemon failed")?;

    Ok(())
}
