// src/commands/status.rs
//! Status command

use super::Session;
use anyhow::{Context, Result};

/// Show how the manifest and the installed applications differ
pub fn cmd_status(session: &Session) -> Result<()> {
    let reconciler = session.reconciler()?;
    let status = reconciler.status().context("Failed to read status")?;

    println!("State directory: {}", session.paths.root().display());

    match &status.declared {
        Some(declared) => println!("Manifest: {} applications", declared.len()),
        None => println!("Manifest: not created yet (the daemon will create it)"),
    }
    println!("Installed: {} applications", status.installed.len());
    match &status.last_reconciled {
        Some(last) => println!("Last reconciled: {} applications", last.len()),
        None => println!("Last reconciled: never"),
    }

    match (status.daemon_running, status.daemon_pid) {
        (true, Some(pid)) => println!("Daemon: running (PID {})", pid),
        (true, None) => println!("Daemon: running"),
        (false, _) => println!("Daemon: not running"),
    }

    if status.pending.is_empty() {
        println!("\nSystem is in sync with the manifest");
        return Ok(());
    }

    println!("\nPending changes ({}):", status.pending.summary());
    for package in status.pending.to_remove.iter() {
        println!("  - {}", package);
    }
    for package in status.pending.to_install.iter() {
        println!("  + {}", package);
    }

    Ok(())
}
