// tests/reconcile.rs

//! Diff, apply, and state store behavior through the public API.

mod common;

use common::set;
use flatly::packages::MockPackageManager;
use flatly::packages::mock::MockCall;
use flatly::{Outcome, PackageSet, ReconcileEngine, StateStore, compute_diff};

#[test]
fn test_diff_properties() {
    let s = set(&["a", "b"]);
    assert!(compute_diff(&s, &s).is_empty());

    let delta = compute_diff(&PackageSet::new(), &s);
    assert_eq!(delta.to_install, s);
    assert!(delta.to_remove.is_empty());

    let delta = compute_diff(&s, &PackageSet::new());
    assert!(delta.to_install.is_empty());
    assert_eq!(delta.to_remove, s);

    let delta = compute_diff(&s, &set(&["b", "c"]));
    assert_eq!(delta.to_install, set(&["c"]));
    assert_eq!(delta.to_remove, set(&["a"]));
}

#[test]
fn test_failure_isolation() {
    let mock = MockPackageManager::new();
    mock.fail_on("bad/../name");
    let engine = ReconcileEngine::new(&mock);

    let result = engine.apply(&compute_diff(
        &PackageSet::new(),
        &set(&["valid-pkg", "bad/../name"]),
    ));

    assert_eq!(result.get("valid-pkg"), Some(&Outcome::Installed));
    assert!(matches!(result.get("bad/../name"), Some(Outcome::Failed(_))));
    // The successful install is not rolled back
    assert!(mock.installed().contains("valid-pkg"));
    assert!(!mock.calls().contains(&MockCall::Uninstall("valid-pkg".to_string())));
}

#[test]
fn test_converged_system_is_idempotent() {
    let mock = MockPackageManager::with_installed(["org.gnome.Maps"]);
    let engine = ReconcileEngine::new(&mock);
    let delta = compute_diff(&set(&["org.gnome.Maps"]), &set(&["org.mozilla.firefox"]));

    let first = engine.apply(&delta);
    assert_eq!(first.changed_count(), 2);

    let calls_after_first = mock.calls().len();
    let second = engine.apply(&delta);
    assert!(second.is_noop());
    assert_eq!(mock.calls().len(), calls_after_first);
}

#[test]
fn test_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("active.json"));

    assert_eq!(store.read().unwrap(), (PackageSet::new(), false));

    let packages = set(&["org.mozilla.firefox", "org.gnome.Maps"]);
    store.write(&packages).unwrap();
    assert_eq!(store.read().unwrap(), (packages, true));

    store.write(&PackageSet::new()).unwrap();
    assert_eq!(store.read().unwrap(), (PackageSet::new(), true));
}

#[test]
fn test_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("active.json");
    std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();

    let err = StateStore::new(&path).read().unwrap_err();
    assert!(matches!(err, flatly::Error::CorruptState { .. }));
}

#[test]
fn test_backup_pruning_keeps_newest() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("active.json"));
    let backups = store.backup_dir().to_path_buf();
    std::fs::create_dir_all(&backups).unwrap();

    for stamp in ["20240101_000000", "20240102_000000", "20240103_000000"] {
        std::fs::write(backups.join(format!("active_backup_{}.json", stamp)), "[]\n").unwrap();
    }

    assert_eq!(store.prune_backups(2).unwrap(), 1);
    let remaining = store.list_backups().unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(
        remaining
            .iter()
            .all(|p| !p.to_string_lossy().contains("20240101"))
    );
}
