#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::{
    config,
    constants::LOCKFILE_NAME,
    error::HarnessError,
    process::{self, CapturedRun},
};

/// Runs `op`; on failure runs it exactly once more and, if the retry also
/// fails, surfaces the **original** error.
///
/// The first failure is usually the informative one (a permission error
/// rather than the "already gone" error the retry produces). One retry, no
/// backoff, no error-kind inspection - the covered operations are local and
/// idempotent, and their failures are transient OS-level contention.
pub fn retry_once<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    match op() {
        Ok(value) => Ok(value),
        Err(original) => {
            warn!("operation failed, retrying once: {original:#}");
            op().map_err(|_| original)
        }
    }
}

/// Recursively deletes `directory`, retrying once. A directory that does not
/// exist is success.
pub fn cleanup(directory: &Path) -> Result<()> {
    retry_once(|| {
        if !directory.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(directory)
            .with_context(|| format!("failed to remove {}", directory.display()))
    })
}

/// Builds the install command for the configured package manager.
fn install_command(immutable: bool) -> String {
    let mode = if immutable {
        "--immutable"
    } else {
        "--no-immutable"
    };
    format!("{} install {mode}", config::package_manager())
}

/// Installs a fixture's dependencies with the configured package manager.
///
/// Without a lockfile the package manager's project-root detection walks up
/// the tree and settles somewhere wrong, so an empty one is created first and
/// the install runs in mutable mode. With a lockfile the install is
/// immutable. On failure the lockfile is re-read (the failed attempt may
/// have populated it) to re-decide the mode for the single retry; if the
/// retry also fails, the original error is surfaced.
pub fn run_package_install(
    cwd: &Path,
    env: &[(String, String)],
) -> Result<CapturedRun, HarnessError> {
    let lockfile = cwd.join(LOCKFILE_NAME);
    let existed = lockfile.exists();
    if !existed {
        std::fs::write(&lockfile, "")
            .with_context(|| format!("failed to create {}", lockfile.display()))
            .map_err(HarnessError::Unknown)?;
    }

    match process::run(&install_command(existed), Some(cwd), env) {
        Ok(run) => Ok(run),
        Err(original) => {
            warn!("package install failed, retrying once");
            let populated = std::fs::read_to_string(&lockfile)
                .map(|contents| !contents.trim().is_empty())
                .unwrap_or(false);
            process::run(&install_command(populated), Some(cwd), env).map_err(|_| original)
        }
    }
}
