// src/packages/flatpak.rs

//! Flatpak backend driven through the `flatpak` command-line tool
//!
//! Every invocation runs with stdin nullified and a hard timeout. When the
//! timeout expires the child is killed and the call fails with
//! `Error::ToolTimeout`, so a stuck download cannot hang the daemon.

use crate::error::{Error, Result};
use crate::model::PackageSet;
use crate::packages::PackageManager;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Default timeout for a single flatpak invocation (10 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Which flatpak installation to operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Installation {
    /// Per-user installation (`--user`)
    User,
    /// System-wide installation (`--system`)
    System,
}

impl Installation {
    fn flag(&self) -> &'static str {
        match self {
            Self::User => "--user",
            Self::System => "--system",
        }
    }
}

/// `PackageManager` implementation backed by the flatpak CLI
#[derive(Debug, Clone)]
pub struct FlatpakCli {
    binary: PathBuf,
    installation: Option<Installation>,
    remote: Option<String>,
    timeout: Duration,
}

impl Default for FlatpakCli {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatpakCli {
    /// Use `flatpak` from `PATH` with the default installation
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("flatpak"),
            installation: None,
            remote: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the path to the flatpak binary
    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_installation(mut self, installation: Option<Installation>) -> Self {
        self.installation = installation;
        self
    }

    /// Remote to install from (e.g. "flathub")
    pub fn with_remote(mut self, remote: Option<String>) -> Self {
        self.remote = remote;
        self
    }

    /// Set the per-invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn list_args(&self) -> Vec<String> {
        let mut args = vec!["list".to_string(), "--app".to_string()];
        if let Some(installation) = self.installation {
            args.push(installation.flag().to_string());
        }
        args.push("--columns=application".to_string());
        args
    }

    fn install_args(&self, name: &str) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            "--noninteractive".to_string(),
            "--assumeyes".to_string(),
        ];
        if let Some(installation) = self.installation {
            args.push(installation.flag().to_string());
        }
        if let Some(remote) = &self.remote {
            args.push(remote.clone());
        }
        args.push(name.to_string());
        args
    }

    fn uninstall_args(&self, name: &str) -> Vec<String> {
        let mut args = vec![
            "uninstall".to_string(),
            "--noninteractive".to_string(),
            "--assumeyes".to_string(),
        ];
        if let Some(installation) = self.installation {
            args.push(installation.flag().to_string());
        }
        args.push(name.to_string());
        args
    }

    fn run(&self, args: &[String]) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.args(args);
        run_with_timeout(command, self.timeout)
    }
}

impl PackageManager for FlatpakCli {
    fn list_installed(&self) -> Result<PackageSet> {
        debug!("Querying installed flatpak applications");
        let stdout = self.run(&self.list_args())?;
        let packages = parse_app_list(&stdout);
        debug!("Found {} installed applications", packages.len());
        Ok(packages)
    }

    fn canonical_name(&self, name: &str) -> String {
        app_id_from_ref(name.trim()).to_string()
    }

    fn is_installed(&self, name: &str) -> Result<bool> {
        validate_package_name(name)?;
        Ok(self.list_installed()?.contains(name))
    }

    fn install(&self, name: &str) -> Result<()> {
        validate_package_name(name)?;
        info!("Installing {}", name);
        self.run(&self.install_args(name))?;
        info!("{} successfully installed", name);
        Ok(())
    }

    fn uninstall(&self, name: &str) -> Result<()> {
        validate_package_name(name)?;
        info!("Uninstalling {}", name);
        self.run(&self.uninstall_args(name))?;
        info!("{} successfully uninstalled", name);
        Ok(())
    }
}

/// Reject anything that is not a bare application id
///
/// `list` reports ids like `org.gnome.Maps`, and reconciliation matches names
/// exactly, so a name with a `/` could never be seen as installed. Refs are
/// mapped to their id by `app_id_from_ref` before they get here.
pub fn validate_package_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('-')
        || name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/')
        || name.contains("..");

    if invalid {
        return Err(Error::InvalidPackageName(name.to_string()));
    }
    Ok(())
}

/// Reduce a full ref (`app/org.gnome.Maps/x86_64/stable`) to its application id
///
/// Anything else is returned unchanged.
pub fn app_id_from_ref(name: &str) -> &str {
    let mut parts = name.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("app"), Some(id), Some(_arch), Some(_branch), None) if !id.is_empty() => id,
        _ => name,
    }
}

/// Parse `flatpak list --columns=application` output, one id per line
fn parse_app_list(stdout: &str) -> PackageSet {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Run `command` to completion or kill it once `timeout` elapses, returning stdout
///
/// stdout and stderr are drained on helper threads while we wait, so a child
/// that writes more than a pipe buffer of progress output cannot block.
pub(crate) fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<String> {
    let cmdline = describe(&command);
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("Executing: {}", cmdline);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::ToolNotFound(format!("{}: {}", program, e))
            } else {
                Error::IoError(format!("Failed to spawn `{}`: {}", cmdline, e))
            }
        })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            warn!("`{}` timed out after {:?}, killing it", cmdline, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::ToolTimeout {
                command: cmdline,
                timeout,
            });
        }
    };

    let stdout = collect(stdout_reader);
    let stderr = collect(stderr_reader);

    if !status.success() {
        return Err(Error::ToolFailed {
            command: cmdline,
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        debug!("[{}] {}", program, line);
    }

    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_app_list() {
        let output = "org.gnome.Maps\n\norg.mozilla.firefox\n  com.spotify.Client  \n";
        let packages = parse_app_list(output);
        assert_eq!(
            packages.iter().collect::<Vec<_>>(),
            vec!["com.spotify.Client", "org.gnome.Maps", "org.mozilla.firefox"]
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_app_list("").is_empty());
        assert!(parse_app_list("\n\n").is_empty());
    }

    #[test]
    fn test_default_args() {
        let cli = FlatpakCli::new();
        assert_eq!(cli.list_args(), vec!["list", "--app", "--columns=application"]);
        assert_eq!(
            cli.install_args("org.gnome.Maps"),
            vec!["install", "--noninteractive", "--assumeyes", "org.gnome.Maps"]
        );
        assert_eq!(
            cli.uninstall_args("org.gnome.Maps"),
            vec!["uninstall", "--noninteractive", "--assumeyes", "org.gnome.Maps"]
        );
    }

    #[test]
    fn test_user_installation_with_remote() {
        let cli = FlatpakCli::new()
            .with_installation(Some(Installation::User))
            .with_remote(Some("flathub".to_string()));

        assert_eq!(
            cli.list_args(),
            vec!["list", "--app", "--user", "--columns=application"]
        );
        assert_eq!(
            cli.install_args("org.gnome.Maps"),
            vec![
                "install",
                "--noninteractive",
                "--assumeyes",
                "--user",
                "flathub",
                "org.gnome.Maps"
            ]
        );
        // Remote only applies to installs
        assert_eq!(
            cli.uninstall_args("org.gnome.Maps"),
            vec![
                "uninstall",
                "--noninteractive",
                "--assumeyes",
                "--user",
                "org.gnome.Maps"
            ]
        );
    }

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("org.gnome.Maps").is_ok());
        assert!(validate_package_name("com.github.Flacon_flacon-2").is_ok());

        for bad in [
            "",
            "--system",
            "bad/../name",
            "..",
            "org.gnome Maps",
            "a\nb",
            "app/org.gnome.Maps/x86_64/stable",
            "org.example/Bad",
        ] {
            assert!(
                matches!(validate_package_name(bad), Err(Error::InvalidPackageName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_app_id_from_ref() {
        assert_eq!(app_id_from_ref("app/org.gnome.Maps/x86_64/stable"), "org.gnome.Maps");
        assert_eq!(app_id_from_ref("org.gnome.Maps"), "org.gnome.Maps");
        // Runtimes and partial refs are left for validation to reject
        let runtime = "runtime/org.gnome.Platform/x86_64/46";
        assert_eq!(app_id_from_ref(runtime), runtime);
        assert_eq!(app_id_from_ref("app/org.gnome.Maps"), "app/org.gnome.Maps");
        assert_eq!(app_id_from_ref("app//x86_64/stable"), "app//x86_64/stable");

        let cli = FlatpakCli::new();
        assert_eq!(
            cli.canonical_name(" app/org.gnome.Maps/x86_64/stable "),
            "org.gnome.Maps"
        );
    }

    #[test]
    fn test_invalid_name_never_spawns() {
        let cli = FlatpakCli::new().with_binary("/nonexistent/flatpak");
        // Validation fails before the missing binary would be noticed
        assert!(matches!(
            cli.install("bad/../name"),
            Err(Error::InvalidPackageName(_))
        ));
    }

    #[test]
    fn test_missing_binary() {
        let cli = FlatpakCli::new().with_binary("/nonexistent/flatpak");
        assert!(matches!(cli.list_installed(), Err(Error::ToolNotFound(_))));
    }

    #[test]
    fn test_run_captures_stdout() {
        let mut command = Command::new("sh");
        command.args(["-c", "printf 'org.gnome.Maps\\norg.mozilla.firefox\\n'"]);
        let stdout = run_with_timeout(command, Duration::from_secs(10)).unwrap();
        assert_eq!(parse_app_list(&stdout).len(), 2);
    }

    #[test]
    fn test_run_nonzero_exit() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'error: No remote refs found' >&2; exit 3"]);
        match run_with_timeout(command, Duration::from_secs(10)) {
            Err(Error::ToolFailed { code, stderr, .. }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "error: No remote refs found");
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_run_timeout_kills_child() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let started = std::time::Instant::now();
        let result = run_with_timeout(command, Duration::from_millis(200));
        assert!(matches!(result, Err(Error::ToolTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_run_large_output_does_not_block() {
        // Well past a 64 KiB pipe buffer
        let mut command = Command::new("sh");
        command.args(["-c", "i=0; while [ $i -lt 20000 ]; do echo org.example.App$i; i=$((i+1)); done"]);
        let stdout = run_with_timeout(command, Duration::from_secs(30)).unwrap();
        assert_eq!(parse_app_list(&stdout).len(), 20000);
    }
}
