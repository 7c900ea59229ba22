//! # proctor
//!
//! An end-to-end harness for exercising a Jest-style JavaScript test-runner
//! CLI: it materializes fixture projects on disk, invokes the runner as a
//! subprocess, and rewrites the captured output into a deterministic form
//! that can be diffed against stored baselines.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// External-tool availability probing
pub mod capability;
/// Process-wide configuration state and the shared runtime
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// The harness's typed error vocabulary
pub mod error;
/// Fixture trees: file writing, symlinks, templates, sandboxes
pub mod fixture;
/// Taming captured runner output
pub mod output;
/// The subprocess engine
pub mod process;
/// Retry-once wrappers for flaky filesystem and install operations
pub mod retry;
/// Invoking the runner under test
pub mod runner;

pub use crate::{
    capability::{Capabilities, Tool},
    error::HarnessError,
    fixture::{Sandbox, Template},
    output::{
        BaselineDiff, IconMap, Summary, SummaryCounts,
        normalize::{replace_seed, replace_time, sort_lines},
        summary::{extract_sorted_summary, extract_summaries, extract_summary},
    },
    process::CapturedRun,
    runner::{ContinuousRun, RunnerOptions, TestRunner},
};
