#![cfg(unix)]

use std::cell::Cell;

use anyhow::anyhow;
use proctor::{
    fixture::write_files,
    retry::{cleanup, retry_once, run_package_install},
};

#[test]
fn retry_once_returns_the_first_success() {
    let calls = Cell::new(0);
    let value = retry_once(|| {
        calls.set(calls.get() + 1);
        Ok::<_, anyhow::Error>("done")
    })
    .expect("first attempt succeeds");

    assert_eq!(value, "done");
    assert_eq!(calls.get(), 1);
}

#[test]
fn retry_once_retries_exactly_once() {
    let calls = Cell::new(0);
    let value = retry_once(|| {
        calls.set(calls.get() + 1);
        if calls.get() == 1 {
            Err(anyhow!("transient"))
        } else {
            Ok("recovered")
        }
    })
    .expect("second attempt succeeds");

    assert_eq!(value, "recovered");
    assert_eq!(calls.get(), 2);
}

#[test]
fn retry_once_surfaces_the_original_error() {
    let calls = Cell::new(0);
    let err = retry_once(|| -> anyhow::Result<()> {
        calls.set(calls.get() + 1);
        Err(anyhow!("attempt {}", calls.get()))
    })
    .expect_err("both attempts fail");

    assert_eq!(calls.get(), 2);
    // The first error is the diagnostic one; the retry's is discarded.
    assert_eq!(err.to_string(), "attempt 1");
}

#[test]
fn cleanup_removes_a_populated_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doomed = dir.path().join("workspace");
    write_files(&doomed, [("deep/nested/file.txt", "bye")]).expect("write");

    cleanup(&doomed).expect("cleanup");
    assert!(!doomed.exists());
}

#[test]
fn cleanup_of_a_missing_directory_is_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    cleanup(&dir.path().join("never-created")).expect("cleanup");
}

/// Points the configured package manager at a script that records its
/// arguments, so install-mode decisions are observable.
fn install_fixture(dir: &std::path::Path, exit_code: i32) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-pm");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\"\nexit {exit_code}\n"),
    )
    .expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    script
}

#[test]
fn package_install_creates_a_lockfile_and_uses_mutable_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = install_fixture(dir.path(), 0);
    // Config snapshots the environment on first touch; this test binary
    // sets the override before anything else reads it.
    unsafe {
        std::env::set_var("PROCTOR_PACKAGE_MANAGER", &script);
    }

    let run = run_package_install(dir.path(), &[]).expect("install");
    assert!(run.success());
    assert_eq!(run.stdout.trim(), "install --no-immutable");
    assert!(dir.path().join("yarn.lock").exists());

    // A non-empty lockfile flips the next install to immutable mode.
    std::fs::write(dir.path().join("yarn.lock"), "resolved: stuff\n").expect("populate lockfile");
    let run = run_package_install(dir.path(), &[]).expect("install");
    assert_eq!(run.stdout.trim(), "install --immutable");
}
