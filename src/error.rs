use std::path::PathBuf;

use thiserror::Error;

use crate::process::CapturedRun;

/// Failure vocabulary for the harness. Every variant that wraps runner or
/// subprocess output embeds that output in its message, so a failing test
/// prints enough to diagnose a format drift without re-running anything.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A subprocess exited nonzero (or never produced an exit code) in the
    /// throwing `run` variant.
    #[error("command `{command}` exited with code {}\n\n{run:#?}", run.exit_code)]
    CommandFailed {
        /// The whitespace-joined command that was executed.
        command: String,
        /// Everything captured before the failure.
        run:     CapturedRun,
    },
    /// The fixture directory has no package.json and the check was not
    /// skipped.
    #[error(
        "expected a package.json at\n  {}\nwithout one the runner walks up the directory tree and \
         settles on whatever project root it finds first",
        path.display()
    )]
    MissingPackageJson {
        /// The manifest path that was checked.
        path: PathBuf,
    },
    /// The runner's `--json` (or `--show-config`) stdout did not parse.
    #[error("could not parse runner JSON output\nERROR: {source}\nSTDOUT: {stdout}\nSTDERR: {stderr}")]
    JsonUnparsable {
        /// Raw stdout that failed to parse.
        stdout: String,
        /// Raw stderr from the same run.
        stderr: String,
        /// The underlying parse error.
        source: serde_json::Error,
    },
    /// No summary block was found where one is required.
    #[error("could not find a test summary in the output\nOUTPUT:\n{output}")]
    SummaryMissing {
        /// The full text that was scanned.
        output: String,
    },
    /// An external tool needed by the requested operation is not installed.
    #[error("`{tool}` is not installed or not on PATH")]
    MissingTool {
        /// The tool name as probed.
        tool: String,
    },
    /// A template referenced a placeholder with no corresponding value.
    #[error("template placeholder ${index} has no value ({available} provided)")]
    TemplateIndex {
        /// The placeholder number as written in the template.
        index:     usize,
        /// How many values the caller supplied.
        available: usize,
    },
    /// Unknown error
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}
