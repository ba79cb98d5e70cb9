// src/commands/package.rs
//! One-shot install and remove commands

use super::Session;
use anyhow::{Context, Result};
use flatly::Outcome;
use flatly::daemon::OneShotReport;
use tracing::info;

/// Install an application now and refresh the manifest
pub fn cmd_add(session: &Session, name: &str) -> Result<()> {
    info!("Adding {}", name);
    let reconciler = session.reconciler()?;
    let report = reconciler
        .add(name)
        .with_context(|| format!("Could not add {}", name))?;

    print_report(&report);
    Ok(())
}

/// Uninstall an application now and refresh the manifest
pub fn cmd_remove(session: &Session, name: &str) -> Result<()> {
    info!("Removing {}", name);
    let reconciler = session.reconciler()?;
    let report = reconciler
        .remove(name)
        .with_context(|| format!("Could not remove {}", name))?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &OneShotReport) {
    let package = &report.outcome.package;
    match &report.outcome.outcome {
        Outcome::Installed => println!("Installed {}", package),
        Outcome::Removed => println!("Removed {}", package),
        Outcome::SkippedAlreadyPresent => println!("{} is already installed", package),
        Outcome::SkippedAlreadyAbsent => println!("{} is not installed", package),
        // Failures are returned as errors before a report exists
        Outcome::Failed(reason) => println!("{}: {}", package, reason),
    }
    println!("Manifest now lists {} applications", report.declared.len());
}
