// src/cli.rs
//! CLI definitions for flatly
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flatly")]
#[command(version)]
#[command(about = "Keep installed Flatpak applications in sync with a manifest", long_about = None)]
pub struct Cli {
    /// Keep state in the current directory instead of the config directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// State directory (overrides FLATLY_CONFIG_DIR)
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install an application and record it in the manifest
    Add {
        /// Flatpak application ID (e.g. org.mozilla.firefox)
        name: String,
    },

    /// Uninstall an application and drop it from the manifest
    Remove {
        /// Flatpak application ID
        name: String,
    },

    /// Reconcile the system with the manifest periodically
    Daemon {
        /// Time between cycles (e.g. 30s, 5m); overrides config.toml
        #[arg(long, value_name = "DURATION")]
        interval: Option<String>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Show differences between the manifest and installed applications
    Status,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
