#![cfg(unix)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use proctor::{HarnessError, RunnerOptions, TestRunner, config, fixture::create_empty_package};

/// Writes an executable stub-runner script and returns its path.
fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("stub-runner");
    std::fs::write(&script, format!("#!/bin/sh\n{body}")).expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    script
}

/// A fixture directory with a package.json, so the manifest check passes.
fn fixture_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    create_empty_package(dir.path(), None).expect("scaffold");
    dir
}

#[test]
fn run_surfaces_the_exit_code_without_erroring() {
    let dir = fixture_dir();
    let script = write_script(dir.path(), "echo one test failed\nexit 1\n");

    let run = TestRunner::new(script)
        .run(dir.path(), &[], &RunnerOptions::default())
        .expect("run");

    assert_eq!(run.exit_code, 1);
    assert_eq!(run.stdout.trim(), "one test failed");
}

#[test]
fn run_normalizes_status_glyphs_on_both_streams() {
    let dir = fixture_dir();
    let script = write_script(dir.path(), "echo '× fail √ pass'\necho '× err' >&2\n");

    let run = TestRunner::new(script)
        .run(dir.path(), &[], &RunnerOptions::default())
        .expect("run");

    assert_eq!(run.stdout.trim(), "✕ fail ✓ pass");
    assert_eq!(run.stderr.trim(), "✕ err");
}

#[test]
fn run_forces_color_off_and_passes_node_settings() {
    let dir = fixture_dir();
    let script = write_script(
        dir.path(),
        "echo \"color=$FORCE_COLOR options=$NODE_OPTIONS\"\n",
    );

    let options = RunnerOptions::builder()
        .node_options("--max-old-space-size=64")
        .build();
    let run = TestRunner::new(script)
        .run(dir.path(), &[], &options)
        .expect("run");

    assert_eq!(
        run.stdout.trim(),
        "color=0 options=--max-old-space-size=64"
    );
}

#[test]
fn run_rejects_a_fixture_without_package_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), "echo unreachable\n");

    let err = TestRunner::new(&script)
        .run(dir.path(), &[], &RunnerOptions::default())
        .expect_err("no package.json");
    assert!(matches!(err, HarnessError::MissingPackageJson { .. }));

    // The same invocation goes through once the check is skipped.
    let options = RunnerOptions::builder().skip_pkg_json_check(true).build();
    let run = TestRunner::new(script)
        .run(dir.path(), &[], &options)
        .expect("run");
    assert_eq!(run.stdout.trim(), "unreachable");
}

#[test]
fn run_reports_a_deadline_expiry_as_timed_out() {
    let dir = fixture_dir();
    let script = write_script(dir.path(), "echo started\nexec sleep 30\n");

    let options = RunnerOptions::builder()
        .timeout(Duration::from_millis(300))
        .build();
    let run = TestRunner::new(script)
        .run(dir.path(), &[], &options)
        .expect("run");

    assert!(run.timed_out);
    assert_eq!(run.exit_code, -1);
}

#[test]
fn run_json_appends_the_flag_and_parses_stdout() {
    let dir = fixture_dir();
    let script = write_script(dir.path(), "echo \"args=$@\" >&2\necho '{\"success\":true,\"numTotalTests\":3}'\n");

    let (run, payload) = TestRunner::new(script)
        .run_json(dir.path(), &["--ci".to_string()], &RunnerOptions::default())
        .expect("run json");

    assert_eq!(run.stderr.trim(), "args=--ci --json");
    assert_eq!(payload["success"], true);
    assert_eq!(payload["numTotalTests"], 3);
}

#[test]
fn run_json_embeds_both_streams_when_parsing_fails() {
    let dir = fixture_dir();
    let script = write_script(dir.path(), "echo 'not json at all'\necho 'warned' >&2\n");

    let err = TestRunner::new(script)
        .run_json(dir.path(), &[], &RunnerOptions::default())
        .expect_err("unparsable");
    match err {
        HarnessError::JsonUnparsable { stdout, stderr, .. } => {
            assert!(stdout.contains("not json at all"));
            assert!(stderr.contains("warned"));
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[test]
fn show_config_parses_the_dump_and_requires_exit_zero() {
    let dir = fixture_dir();
    let script = write_script(
        dir.path(),
        "echo '{\"globalConfig\":{\"watch\":false},\"configs\":[{}],\"version\":\"30.0.0\"}'\n",
    );

    let dump = TestRunner::new(&script)
        .show_config(dir.path(), &[], &RunnerOptions::default())
        .expect("show config");
    assert_eq!(dump.version, "30.0.0");
    assert_eq!(dump.configs.len(), 1);
    assert_eq!(dump.global_config["watch"], false);

    let failing = write_script(dir.path(), "exit 2\n");
    let err = TestRunner::new(failing)
        .show_config(dir.path(), &[], &RunnerOptions::default())
        .expect_err("nonzero exit");
    assert!(matches!(err, HarnessError::CommandFailed { .. }));
}

#[test]
fn continuous_run_waits_feeds_stdin_and_collects_on_end() {
    let dir = fixture_dir();
    let script = write_script(
        dir.path(),
        "echo ready\nread line\necho \"got $line\"\nexec sleep 30\n",
    );

    let mut watch = TestRunner::new(script)
        .spawn_continuous(dir.path(), &[], RunnerOptions::default())
        .expect("spawn");

    watch
        .wait_until_blocking(|stdout, _| stdout.contains("ready"))
        .expect("runner announces itself");

    config::runtime()
        .block_on(watch.write_stdin(b"ping\n"))
        .expect("feed stdin");
    watch
        .wait_until_blocking(|stdout, _| stdout.contains("got ping"))
        .expect("runner echoes stdin");

    let (stdout, _) = watch.current_output();
    assert!(stdout.contains("ready"));

    let run = watch.end_blocking().expect("end");
    assert!(run.stdout.contains("ready"));
    assert!(run.stdout.contains("got ping"));
    // Killed, so no exit code is available.
    assert_eq!(run.exit_code, -1);
}

#[test]
fn continuous_wait_times_out_when_the_output_never_appears() {
    let dir = fixture_dir();
    let script = write_script(dir.path(), "echo quiet\nexec sleep 30\n");

    let options = RunnerOptions::builder()
        .timeout(Duration::from_millis(400))
        .build();
    let watch = TestRunner::new(script)
        .spawn_continuous(dir.path(), &[], options)
        .expect("spawn");

    let err = watch
        .wait_until_blocking(|stdout, _| stdout.contains("never printed"))
        .expect_err("deadline expires");
    assert!(err.to_string().contains("timed out"));

    watch.end_blocking().expect("end");
}
