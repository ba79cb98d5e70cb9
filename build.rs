// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: application ID
fn name_arg(help: &'static str) -> Arg {
    Arg::new("name").required(true).value_name("APP_ID").help(help)
}

fn build_cli() -> Command {
    Command::new("flatly")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Keep installed Flatpak applications in sync with a manifest")
        .subcommand_required(false)
        .arg(
            Arg::new("debug")
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Keep state in the current directory instead of the config directory"),
        )
        .arg(
            Arg::new("config_dir")
                .long("config-dir")
                .global(true)
                .value_name("PATH")
                .help("State directory (overrides FLATLY_CONFIG_DIR)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("add")
                .about("Install an application and record it in the manifest")
                .arg(name_arg("Flatpak application ID (e.g. org.mozilla.firefox)")),
        )
        .subcommand(
            Command::new("remove")
                .about("Uninstall an application and drop it from the manifest")
                .arg(name_arg("Flatpak application ID")),
        )
        .subcommand(
            Command::new("daemon")
                .about("Reconcile the system with the manifest periodically")
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .value_name("DURATION")
                        .help("Time between cycles (e.g. 30s, 5m); overrides config.toml"),
                )
                .arg(
                    Arg::new("once")
                        .long("once")
                        .action(ArgAction::SetTrue)
                        .help("Run a single cycle and exit"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show differences between the manifest and installed applications"),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("flatly.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
