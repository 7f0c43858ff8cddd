//! End-to-end reconciliation against a real watched directory.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use dynflag::{DynValue, FlagSet};
use dynflag_configmap::{setup, ConfigMapError, Updater};

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// Writes a file through a rename so the watcher sees a single event.
fn write_atomically(dir: &Path, name: &str, contents: &[u8]) {
    let staged = dir.join(format!(".{name}.tmp"));
    fs::write(&staged, contents).unwrap();
    fs::rename(&staged, dir.join(name)).unwrap();
}

#[tokio::test]
async fn binary_and_loglevel_flags_follow_the_directory() {
    let flags = FlagSet::new("updater_test");
    let binary = flags
        .register(
            "binary_flag",
            DynValue::new(Vec::new(), "a test binary flag").with_validator(|data: &Vec<u8>| {
                if data.len() > 4 {
                    Err(format!("binary flag too long: {} bytes", data.len()))
                } else {
                    Ok(())
                }
            }),
        )
        .unwrap();
    let notified = Arc::new(AtomicUsize::new(0));
    let notified_in_notifier = Arc::clone(&notified);
    let loglevel = flags
        .register(
            "loglevel",
            DynValue::new(String::from("debug"), "log level")
                .with_input_mutator(|raw| raw.trim().to_lowercase())
                .with_validator(|level: &String| match level.as_str() {
                    "debug" | "info" | "warn" | "error" | "fatal" => Ok(()),
                    _ => Err(format!("unknown level {level:?}")),
                })
                .with_sync_notifier(move |_old, _new| {
                    notified_in_notifier.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .unwrap();

    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("config");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("extra_flag"), b"ignored").unwrap();
    fs::write(dir.join(".hidden"), b"ignored").unwrap();
    fs::write(dir.join("binary_flag"), [0u8, 1, 2, 3]).unwrap();

    let mut updater = setup(flags.clone(), &dir).unwrap();

    // The initial scan is synchronous: the binary flag is already loaded
    // and the unknown file produced exactly one warning.
    assert_eq!(updater.warnings(), 1);
    assert_eq!(*binary.get(), vec![0, 1, 2, 3]);
    assert_eq!(updater.errors(), 0);

    write_atomically(&dir, "binary_flag", &[1, 0]);
    write_atomically(&dir, "loglevel", b" InFO\n\n");

    assert!(wait_for(|| *binary.get() == vec![1, 0]).await, "binary flag did not converge");
    assert!(
        wait_for(|| loglevel.get().as_str() == "info").await,
        "loglevel did not converge"
    );
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(updater.errors(), 0);

    // A value the validator rejects is counted and the old value stays.
    write_atomically(&dir, "binary_flag", &[1, 2, 3, 4, 5]);
    assert!(wait_for(|| updater.errors() >= 1).await, "error was not counted");
    assert_eq!(*binary.get(), vec![1, 0]);

    updater.stop().unwrap();
}

#[tokio::test]
async fn initial_scan_reports_bad_values_and_continues() {
    let flags = FlagSet::new("updater_init");
    let good = flags.dynamic("good_flag", 0i64, "a good flag").unwrap();
    flags.dynamic("bad_flag", 0i64, "a bad flag").unwrap();

    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("good_flag"), "42").unwrap();
    fs::write(tmp.path().join("bad_flag"), "not a number").unwrap();

    let mut updater = Updater::new(flags, tmp.path()).unwrap();
    let err = updater.initialize().unwrap_err();
    match err {
        ConfigMapError::Sync { count, details } => {
            assert_eq!(count, 1);
            assert!(details.contains("bad_flag"), "{details}");
        }
        other => panic!("expected sync error, got {other}"),
    }
    // The scan did not stop at the bad file.
    assert_eq!(*good.get(), 42);
    assert_eq!(updater.errors(), 1);
    assert_eq!(updater.warnings(), 0);
}

#[tokio::test]
async fn static_flags_load_at_startup_but_not_after() {
    let flags = FlagSet::new("updater_static");
    let threshold = flags
        .static_value("threshold", 10i64, "a static threshold")
        .unwrap();

    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("threshold"), "20").unwrap();

    let mut updater = setup(flags.clone(), tmp.path()).unwrap();
    assert_eq!(threshold.get(), 20);

    // Post-startup writes to a static flag are silently skipped.
    write_atomically(tmp.path(), "threshold", b"30");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(threshold.get(), 20);
    assert_eq!(updater.errors(), 0);

    updater.stop().unwrap();
}

#[tokio::test]
async fn lifecycle_misuse_is_an_error() {
    let flags = FlagSet::new("updater_lifecycle");
    let tmp = TempDir::new().unwrap();

    let mut fresh = Updater::new(flags.clone(), tmp.path()).unwrap();
    assert!(fresh.start().is_err(), "start before initialize");
    assert!(fresh.stop().is_err(), "stop before start");

    let mut updater = Updater::new(flags, tmp.path()).unwrap();
    updater.initialize().unwrap();
    assert!(updater.initialize().is_err(), "double initialize");
    updater.start().unwrap();
    assert!(updater.start().is_err(), "double start");
    updater.stop().unwrap();
    updater.stop().unwrap();
    assert!(updater.start().is_err(), "start after stop");
}

#[cfg(unix)]
#[tokio::test]
async fn directory_symlink_swap_reloads_all_flags() {
    use std::os::unix::fs::symlink;

    let flags = FlagSet::new("updater_swap");
    let value = flags
        .dynamic("swapped_flag", String::from("initial"), "swap test")
        .unwrap();

    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("config");
    fs::create_dir(&root).unwrap();

    // Kubernetes volume layout: the real files live in a timestamped
    // directory reached through the ..data symlink.
    let first = root.join("..2024_01_01");
    fs::create_dir(&first).unwrap();
    fs::write(first.join("swapped_flag"), "one").unwrap();
    symlink("..2024_01_01", root.join(DATA)).unwrap();
    symlink(format!("{DATA}/swapped_flag"), root.join("swapped_flag")).unwrap();

    let mut updater = setup(flags.clone(), &root).unwrap();
    assert_eq!(value.get().as_str(), "one");

    // Publish a new generation and swap ..data atomically.
    let second = root.join("..2024_01_02");
    fs::create_dir(&second).unwrap();
    fs::write(second.join("swapped_flag"), "two").unwrap();
    symlink("..2024_01_02", root.join("..data_tmp")).unwrap();
    fs::rename(root.join("..data_tmp"), root.join(DATA)).unwrap();

    assert!(
        wait_for(|| value.get().as_str() == "two").await,
        "flag did not follow the directory swap"
    );
    updater.stop().unwrap();
}

#[cfg(unix)]
const DATA: &str = "..data";
