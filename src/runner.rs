#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, Command},
    sync::Notify,
    task::JoinHandle,
    time::timeout,
};
use tracing::debug;
use typed_builder::TypedBuilder;
use which::which;

use crate::{
    config,
    error::HarnessError,
    output::normalize::{normalize_icons, strip_ansi},
    process::{self, CapturedRun, StdinSource},
};

/// Per-invocation options for the runner under test.
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(doc)]
pub struct RunnerOptions {
    /// Value for `NODE_OPTIONS` in the child environment.
    #[builder(default, setter(strip_option, into))]
    pub node_options:        Option<String>,
    /// Value for `NODE_PATH` in the child environment.
    #[builder(default, setter(strip_option, into))]
    pub node_path:           Option<String>,
    /// Skip the package.json existence check on the fixture directory.
    #[builder(default)]
    pub skip_pkg_json_check: bool,
    /// Remove ANSI escape sequences from both captured streams.
    #[builder(default)]
    pub strip_ansi:          bool,
    /// Kill the runner after this long; defaults to the configured one-shot
    /// (or, for continuous runs, watch) deadline.
    #[builder(default, setter(strip_option))]
    pub timeout:             Option<Duration>,
}

/// The runner's `--show-config` dump.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfigDump {
    /// The resolved global configuration.
    pub global_config: serde_json::Value,
    /// One resolved configuration per project.
    pub configs:       Vec<serde_json::Value>,
    /// The runner's version string.
    pub version:       String,
}

/// Applies the stream rewrites every captured run goes through: icon
/// canonicalization always, ANSI stripping on request.
fn normalize_streams(mut run: CapturedRun, options: &RunnerOptions) -> CapturedRun {
    run.stdout = normalize_icons(&run.stdout);
    run.stderr = normalize_icons(&run.stderr);
    if options.strip_ansi {
        run.stdout = strip_ansi(&run.stdout);
        run.stderr = strip_ansi(&run.stderr);
    }
    run
}

/// Invokes one resolved runner binary against fixture directories.
///
/// Explicit construction keeps tests independent of process-global state;
/// the CLI resolves one from configuration via [`TestRunner::from_config`].
#[derive(Debug, Clone)]
pub struct TestRunner {
    /// Absolute path of the binary to invoke.
    binary: PathBuf,
}

impl TestRunner {
    /// Wraps an already-resolved runner binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolves the runner from configuration: the override when set (used
    /// directly if it names an existing file, looked up on PATH otherwise),
    /// else a PATH lookup of the default runner name.
    pub fn from_config() -> Result<Self> {
        let name = config::runner_override().unwrap_or_else(config::runner_name);
        let candidate = PathBuf::from(&name);
        let binary = if candidate.is_file() {
            candidate
        } else {
            which(&name).with_context(|| format!("cannot find `{name}` on PATH"))?
        };
        Ok(Self::new(binary))
    }

    /// The resolved binary path.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Errors unless `<dir>/package.json` exists (or the check is skipped).
    /// Without one the runner walks up the directory tree and settles on
    /// whatever project root it finds first.
    fn check_package_json(dir: &Path, options: &RunnerOptions) -> Result<(), HarnessError> {
        let manifest = dir.join("package.json");
        if !options.skip_pkg_json_check && !manifest.is_file() {
            return Err(HarnessError::MissingPackageJson { path: manifest });
        }
        Ok(())
    }

    /// Child-environment overrides: color disabled for deterministic text,
    /// plus any node settings from the options.
    fn child_env(options: &RunnerOptions) -> Vec<(OsString, OsString)> {
        let mut env = vec![(OsString::from("FORCE_COLOR"), OsString::from("0"))];
        if let Some(node_options) = &options.node_options {
            env.push((OsString::from("NODE_OPTIONS"), node_options.into()));
        }
        if let Some(node_path) = &options.node_path {
            env.push((OsString::from("NODE_PATH"), node_path.into()));
        }
        env
    }

    /// Runs the runner to completion in `dir` and returns the normalized
    /// captured run.
    ///
    /// Never fails on nonzero exit: the runner's exit-code vocabulary (0
    /// pass, 1 fail, ...) is part of its contract under test, and callers
    /// assert on `exit_code` directly.
    pub fn run(
        &self,
        dir: &Path,
        args: &[String],
        options: &RunnerOptions,
    ) -> Result<CapturedRun, HarnessError> {
        Self::check_package_json(dir, options)?;

        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let env = Self::child_env(options);
        let deadline = options.timeout.unwrap_or_else(config::run_timeout);

        debug!("running {} in {}", self.binary.display(), dir.display());
        let collected = config::runtime()
            .block_on(process::collect(
                &self.binary,
                &args,
                StdinSource::Null,
                Some(dir),
                &env,
                Some(deadline),
            ))
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        Ok(normalize_streams(
            CapturedRun::from_collected(collected),
            options,
        ))
    }

    /// Runs with `--json` appended and parses stdout into a JSON payload.
    ///
    /// A parse failure embeds the parse error and both raw streams, so a
    /// format drift is diagnosable without re-running anything.
    pub fn run_json(
        &self,
        dir: &Path,
        args: &[String],
        options: &RunnerOptions,
    ) -> Result<(CapturedRun, serde_json::Value), HarnessError> {
        let mut args = args.to_vec();
        args.push("--json".to_string());
        let run = self.run(dir, &args, options)?;
        match serde_json::from_str(&run.stdout) {
            Ok(payload) => Ok((run, payload)),
            Err(source) => Err(HarnessError::JsonUnparsable {
                stdout: run.stdout,
                stderr: run.stderr,
                source,
            }),
        }
    }

    /// Runs with `--show-config` appended, requires exit zero, and parses
    /// the configuration dump.
    pub fn show_config(
        &self,
        dir: &Path,
        args: &[String],
        options: &RunnerOptions,
    ) -> Result<RunnerConfigDump, HarnessError> {
        let mut args = args.to_vec();
        args.push("--show-config".to_string());
        let run = self.run(dir, &args, options)?;
        if !run.success() {
            return Err(HarnessError::CommandFailed {
                command: format!("{} --show-config", self.binary.display()),
                run,
            });
        }
        serde_json::from_str(&run.stdout).map_err(|source| HarnessError::JsonUnparsable {
            stdout: run.stdout,
            stderr: run.stderr,
            source,
        })
    }

    /// Spawns the runner (watch mode) without waiting for it to exit.
    ///
    /// A hard wall-clock deadline applies to every subsequent wait; it
    /// defaults to the configured watch-mode deadline.
    pub fn spawn_continuous(
        &self,
        dir: &Path,
        args: &[String],
        options: RunnerOptions,
    ) -> Result<ContinuousRun, HarnessError> {
        Self::check_package_json(dir, &options)?;

        let deadline =
            Instant::now() + options.timeout.unwrap_or_else(config::watch_timeout);

        // Spawning and the reader tasks need a reactor; enter the shared
        // runtime so this stays callable from synchronous test code.
        let _guard = config::runtime().enter();

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in Self::child_env(&options) {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary.display()))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().context("missing stdout pipe")?;
        let stderr = child.stderr.take().context("missing stderr pipe")?;

        let buffers = Arc::new(Mutex::new((String::new(), String::new())));
        let notify = Arc::new(Notify::new());

        /// Appends decoded chunks from one stream into the shared buffers,
        /// waking any pending waiter after each chunk.
        fn pump<R>(
            mut stream: R,
            buffers: Arc<Mutex<(String, String)>>,
            notify: Arc<Notify>,
            is_stdout: bool,
        ) -> JoinHandle<()>
        where
            R: AsyncReadExt + Unpin + Send + 'static,
        {
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let decoded = String::from_utf8_lossy(&chunk[..n]).into_owned();
                            {
                                let mut guard =
                                    buffers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                                if is_stdout {
                                    guard.0.push_str(&decoded);
                                } else {
                                    guard.1.push_str(&decoded);
                                }
                            }
                            notify.notify_waiters();
                        }
                    }
                }
                notify.notify_waiters();
            })
        }

        let stdout_task = pump(stdout, Arc::clone(&buffers), Arc::clone(&notify), true);
        let stderr_task = pump(stderr, Arc::clone(&buffers), Arc::clone(&notify), false);

        Ok(ContinuousRun {
            child,
            stdin,
            buffers,
            notify,
            stdout_task,
            stderr_task,
            deadline,
            options,
        })
    }
}

/// A long-lived watch-mode invocation of the runner.
///
/// Output accumulates as it arrives; callers wait for conditions over the
/// buffers, feed the interactive prompt, and finally terminate and collect.
pub struct ContinuousRun {
    /// The spawned runner process, killed on drop.
    child:       Child,
    /// The child's stdin pipe, for driving the watch prompt.
    stdin:       Option<ChildStdin>,
    /// Accumulated (stdout, stderr).
    buffers:     Arc<Mutex<(String, String)>>,
    /// Woken whenever either stream grows.
    notify:      Arc<Notify>,
    /// Reader draining the child's stdout.
    stdout_task: JoinHandle<()>,
    /// Reader draining the child's stderr.
    stderr_task: JoinHandle<()>,
    /// Wall-clock bound on every wait.
    deadline:    Instant,
    /// Options the run was spawned with, reused for final normalization.
    options:     RunnerOptions,
}

impl ContinuousRun {
    /// Snapshot of the accumulated (stdout, stderr).
    pub fn current_output(&self) -> (String, String) {
        let guard = self
            .buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Waits until `predicate(stdout, stderr)` holds, bounded by the run's
    /// deadline.
    pub async fn wait_until(&self, predicate: impl Fn(&str, &str) -> bool) -> Result<()> {
        loop {
            let notified = self.notify.notified();
            {
                let guard = self
                    .buffers
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if predicate(&guard.0, &guard.1) {
                    return Ok(());
                }
            }
            let remaining = self
                .deadline
                .checked_duration_since(Instant::now())
                .context("timed out waiting for expected runner output")?;
            // A notification between the predicate check and this await would
            // be missed, so cap the wait and re-check periodically.
            let _ = timeout(remaining.min(Duration::from_millis(100)), notified).await;
        }
    }

    /// Writes `bytes` to the watch prompt's stdin.
    pub async fn write_stdin(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().context("runner stdin already closed")?;
        stdin.write_all(bytes).await.context("failed to write to runner stdin")?;
        stdin.flush().await.context("failed to flush runner stdin")
    }

    /// Terminates the runner and collects the final buffers, applying the
    /// same stream normalization as a one-shot run.
    pub async fn end(mut self) -> Result<CapturedRun> {
        drop(self.stdin.take());
        let _ = self.child.start_kill();
        let status = self
            .child
            .wait()
            .await
            .context("failed to reap the continuous runner")?;

        // Let the readers drain whatever was buffered before the kill.
        let _ = self.stdout_task.await;
        let _ = self.stderr_task.await;

        let (stdout, stderr) = {
            let guard = self
                .buffers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.clone()
        };

        let run = CapturedRun {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            timed_out: false,
        };
        Ok(normalize_streams(run, &self.options))
    }

    /// [`Self::wait_until`] joined on the shared runtime, for synchronous
    /// tests.
    pub fn wait_until_blocking(&self, predicate: impl Fn(&str, &str) -> bool) -> Result<()> {
        config::runtime().block_on(self.wait_until(predicate))
    }

    /// [`Self::end`] joined on the shared runtime, for synchronous tests.
    pub fn end_blocking(self) -> Result<CapturedRun> {
        config::runtime().block_on(self.end())
    }
}
