// tests/daemon.rs

//! Daemon cycle and one-shot command tests against a mock flatpak.

mod common;

use common::{TestEnv, set};
use flatly::daemon::{FileLock, SkipReason, run_daemon};
use flatly::{CycleReport, DaemonConfig, Error, Outcome};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn test_bootstrap_then_manifest_edit() {
    let env = TestEnv::new(&["org.gnome.Maps", "org.mozilla.firefox"]);

    let report = env.reconciler.run_cycle().unwrap();
    assert_eq!(report, CycleReport::Bootstrapped { packages: 2 });
    assert_eq!(env.declared(), set(&["org.gnome.Maps", "org.mozilla.firefox"]));

    env.write_manifest("[\n    \"org.gnome.Maps\",\n    \"org.videolan.VLC\"\n]\n");
    match env.reconciler.run_cycle().unwrap() {
        CycleReport::Reconciled { result, .. } => {
            assert_eq!(result.get("org.mozilla.firefox"), Some(&Outcome::Removed));
            assert_eq!(result.get("org.videolan.VLC"), Some(&Outcome::Installed));
        }
        other => panic!("expected Reconciled, got {:?}", other),
    }
    assert_eq!(env.mock.installed(), set(&["org.gnome.Maps", "org.videolan.VLC"]));
}

#[test]
fn test_bootstrap_reentered_after_manifest_deleted() {
    let env = TestEnv::new(&["a"]);
    env.reconciler.run_cycle().unwrap();
    std::fs::remove_file(env.paths().active_file()).unwrap();

    env.mock.set_installed("b", true);
    assert_eq!(
        env.reconciler.run_cycle().unwrap(),
        CycleReport::Bootstrapped { packages: 2 }
    );
    assert!(env.mock.calls().is_empty());
}

#[test]
fn test_truncated_manifest_removes_nothing() {
    let env = TestEnv::new(&["a", "b"]);
    env.reconciler.run_cycle().unwrap();

    env.write_manifest("");
    assert_eq!(
        env.reconciler.run_cycle().unwrap(),
        CycleReport::Skipped(SkipReason::EmptyManifest)
    );
    assert_eq!(env.mock.installed(), set(&["a", "b"]));
}

#[test]
fn test_corrupt_manifest_is_reported() {
    let env = TestEnv::new(&["a"]);
    env.reconciler.run_cycle().unwrap();

    env.write_manifest("[\"a\",");
    assert!(matches!(
        env.reconciler.run_cycle(),
        Err(Error::CorruptState { .. })
    ));

    // Fixing the file lets the next cycle proceed
    env.write_manifest("[\"a\"]");
    assert_eq!(env.reconciler.run_cycle().unwrap(), CycleReport::InSync);
}

#[test]
fn test_add_and_remove_keep_manifest_in_sync() {
    let env = TestEnv::new(&["a"]);
    env.reconciler.run_cycle().unwrap();

    let report = env.reconciler.add("b").unwrap();
    assert_eq!(report.outcome.outcome, Outcome::Installed);
    assert_eq!(env.declared(), set(&["a", "b"]));

    let report = env.reconciler.remove("a").unwrap();
    assert_eq!(report.outcome.outcome, Outcome::Removed);
    assert_eq!(env.declared(), set(&["b"]));

    assert_eq!(env.reconciler.run_cycle().unwrap(), CycleReport::InSync);
}

#[test]
fn test_back_to_back_adds_keep_every_backup() {
    let env = TestEnv::new(&["a"]);
    env.reconciler.run_cycle().unwrap();

    env.reconciler.add("b").unwrap();
    env.reconciler.add("c").unwrap();

    let store = env.reconciler.declared_store();
    let snapshots: Vec<_> = store
        .list_backups()
        .unwrap()
        .iter()
        .map(|path| flatly::StateStore::new(path).read().unwrap().0)
        .collect();
    assert_eq!(snapshots, vec![set(&["a"]), set(&["a", "b"])]);
}

#[test]
fn test_failed_add_is_an_error() {
    let env = TestEnv::new(&["a"]);
    env.mock.fail_on("org.example.Broken");

    let err = env.reconciler.add("org.example.Broken").unwrap_err();
    assert!(err.to_string().contains("org.example.Broken"));
    assert!(!env.paths().active_file().exists());
}

#[test]
fn test_cycle_skips_while_one_shot_holds_lock() {
    let env = TestEnv::new(&["a"]);
    let _state_lock = FileLock::acquire(env.paths().state_lock()).unwrap();

    assert_eq!(
        env.reconciler.run_cycle().unwrap(),
        CycleReport::Skipped(SkipReason::LockBusy)
    );
}

#[tokio::test]
async fn test_daemon_once() {
    let env = TestEnv::new(&["a"]);

    run_daemon(
        env.reconciler.clone(),
        DaemonConfig::default().with_once(true),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(env.declared(), set(&["a"]));
}

#[tokio::test]
async fn test_daemon_stops_promptly_on_cancel() {
    let env = TestEnv::new(&["a"]);
    let token = CancellationToken::new();

    let handle = tokio::spawn(run_daemon(
        env.reconciler.clone(),
        DaemonConfig::default().with_interval(Duration::from_secs(3600)),
        token.clone(),
    ));

    // Wait for the first cycle to bootstrap the manifest
    let active = env.paths().active_file();
    for _ in 0..200 {
        if active.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(active.exists());
    assert!(FileLock::is_held(env.paths().daemon_lock()));

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop after cancellation")
        .unwrap();
    assert!(result.is_ok());
    assert!(!FileLock::is_held(env.paths().daemon_lock()));
}

#[tokio::test]
async fn test_daemon_survives_failing_cycles() {
    let env = TestEnv::new(&["a"]);
    env.mock.set_list_fails(true);
    let token = CancellationToken::new();

    let handle = tokio::spawn(run_daemon(
        env.reconciler.clone(),
        DaemonConfig::default().with_interval(Duration::from_millis(20)),
        token.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    env.mock.set_list_fails(false);
    let active = env.paths().active_file();
    for _ in 0..200 {
        if active.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(active.exists());

    token.cancel();
    handle.await.unwrap().unwrap();
}
