#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
    time::timeout,
};

use crate::{config, error::HarnessError};

/// Drop guard that terminates a spawned child process if callers forget to
/// await it.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> anyhow::Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Raw captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process (a signal status when the
    /// deadline fired and the child was killed).
    pub status:    std::process::ExitStatus,
    /// Contents written to stdout.
    pub stdout:    Vec<u8>,
    /// Contents written to stderr.
    pub stderr:    Vec<u8>,
    /// Whether the deadline expired before the process exited on its own.
    pub timed_out: bool,
}

/// Describes how stdin should be wired for the spawned process.
#[derive(Debug)]
pub enum StdinSource {
    /// Inherit the parent's stdin.
    Inherit,
    /// Attach nothing to stdin.
    Null,
    /// Write the provided bytes, then close stdin.
    Bytes(Vec<u8>),
}

/// One subprocess invocation, decoded and ready for normalization and
/// assertion. `exit_code` is `-1` when the process died without a code
/// (killed on timeout, terminated by a signal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedRun {
    /// Decoded stdout.
    pub stdout:    String,
    /// Decoded stderr.
    pub stderr:    String,
    /// Exit code, or `-1` when none was available.
    pub exit_code: i32,
    /// Whether the process was killed because its deadline expired.
    pub timed_out: bool,
}

impl CapturedRun {
    /// True when the process exited zero within its deadline.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Decodes a raw collection into the string-level view.
    pub(crate) fn from_collected(collected: Collected) -> Self {
        Self {
            stdout:    String::from_utf8_lossy(&collected.stdout).into_owned(),
            stderr:    String::from_utf8_lossy(&collected.stderr).into_owned(),
            exit_code: collected.status.code().unwrap_or(-1),
            timed_out: collected.timed_out,
        }
    }
}

/// Spawns a command, optionally feeds stdin, and collects stdout/stderr.
///
/// When `deadline` elapses before the child exits, the child is killed and
/// the collection is returned with `timed_out` set rather than erroring, so
/// callers can assert on whatever output was produced.
pub async fn collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: StdinSource,
    cwd: Option<&Path>,
    env: &[(OsString, OsString)],
    deadline: Option<Duration>,
) -> Result<Collected> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

    match &stdin {
        StdinSource::Inherit => {
            cmd.stdin(Stdio::inherit());
        }
        StdinSource::Null => {
            cmd.stdin(Stdio::null());
        }
        StdinSource::Bytes(_) => {
            cmd.stdin(Stdio::piped());
        }
    }

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn process")?);
    let stdin_payload = match stdin {
        StdinSource::Bytes(bytes) => Some(bytes),
        StdinSource::Inherit | StdinSource::Null => None,
    };

    if let Some(bytes) = stdin_payload
        && let Some(mut handle) = guard.child_mut()?.stdin.take()
    {
        tokio::spawn(async move {
            if !bytes.is_empty() {
                let _ = handle.write_all(&bytes).await;
            }
            let _ = handle.shutdown().await;
        });
    }

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stdout")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let err_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stderr")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let mut timed_out = false;
    let status = {
        let child = guard.child_mut()?;
        match deadline {
            Some(limit) => {
                let waited = timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status.context("failed to wait on process")?,
                    Err(_) => {
                        timed_out = true;
                        let _ = child.start_kill();
                        child
                            .wait()
                            .await
                            .context("failed to reap timed-out process")?
                    }
                }
            }
            None => child.wait().await.context("failed to wait on process")?,
        }
    };

    let stdout = out_task.await.context("stdout task join error")??;
    let stderr = err_task.await.context("stderr task join error")??;
    guard.disarm();

    Ok(Collected {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Splits a command string on whitespace into program and arguments.
///
/// There is no shell and no quoting support; an argument containing spaces
/// cannot be expressed here.
fn split_command(command: &str) -> Result<(String, Vec<OsString>)> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .context("cannot run an empty command")?
        .to_string();
    let args = parts.map(OsString::from).collect();
    Ok((program, args))
}

/// Converts string-level environment overrides into the OS-level pairs the
/// engine takes.
fn os_env(env: &[(String, String)]) -> Vec<(OsString, OsString)> {
    env.iter()
        .map(|(key, value)| (OsString::from(key), OsString::from(value)))
        .collect()
}

/// Runs a whitespace-split command to completion, erroring on nonzero exit.
///
/// The error carries the full captured run and its message appends the
/// captured fields, so a failed setup step dumps everything a human needs.
/// Callers that expect nonzero exits should use [`try_run`] instead.
pub fn run(
    command: &str,
    cwd: Option<&Path>,
    env: &[(String, String)],
) -> Result<CapturedRun, HarnessError> {
    let run = try_run(command, cwd, env)?;
    if run.success() {
        Ok(run)
    } else {
        Err(HarnessError::CommandFailed {
            command: command.to_string(),
            run,
        })
    }
}

/// Runs a whitespace-split command to completion, returning the captured run
/// whatever its exit code. Only infrastructure failures (unsplittable
/// command, no such working directory) error.
pub fn try_run(command: &str, cwd: Option<&Path>, env: &[(String, String)]) -> Result<CapturedRun> {
    let (program, args) = split_command(command)?;
    let env = os_env(env);
    let collected = config::runtime()
        .block_on(collect(
            &program,
            &args,
            StdinSource::Null,
            cwd,
            &env,
            Some(config::run_timeout()),
        ))
        .with_context(|| format!("failed to run `{command}`"))?;
    Ok(CapturedRun::from_collected(collected))
}
