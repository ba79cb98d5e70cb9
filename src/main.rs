// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Some(Commands::Add { name }) => {
            let session = Session::open(cli.debug, config_dir)?;
            commands::cmd_add(&session, &name)
        }
        Some(Commands::Remove { name }) => {
            let session = Session::open(cli.debug, config_dir)?;
            commands::cmd_remove(&session, &name)
        }
        Some(Commands::Daemon { interval, once }) => {
            let session = Session::open(cli.debug, config_dir)?;
            commands::cmd_daemon(&session, interval.as_deref(), once)
        }
        Some(Commands::Status) => {
            let session = Session::open(cli.debug, config_dir)?;
            commands::cmd_status(&session)
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "flatly", &mut std::io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
