#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # proctor
//!
//! A command-line front end for the harness: run the configured Jest-style
//! runner against a fixture directory, capture its JSON payload, scaffold
//! fixture projects, tabulate the summaries recorded in multi-run logs, and
//! report which external tools are available.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use proctor::{
    RunnerOptions, TestRunner, capability,
    fixture::{create_empty_package, find_files},
    output::{counts::parse_counts, summary::extract_summaries},
};
use tabled::{Table, Tabled, settings::Style};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Run the runner on a fixture directory
    Run(PathBuf, Vec<String>),
    /// Run with `--json` and pretty-print the payload
    Json(PathBuf, Vec<String>),
    /// Create an empty package fixture
    Scaffold(PathBuf),
    /// Tabulate the summaries recorded in log files
    Summary(String),
    /// Report external-tool availability
    Doctor,
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the fixture directory
    fn d() -> impl Parser<PathBuf> {
        positional("DIR").help("Fixture directory to run in")
    }

    /// parses extra runner arguments
    fn a() -> impl Parser<Vec<String>> {
        positional("ARGS").help("Extra arguments for the runner").many()
    }

    let run = construct!(Cmd::Run(d(), a()))
        .to_options()
        .command("run")
        .help("Run the runner on a fixture directory and print normalized output");

    let json = construct!(Cmd::Json(d(), a()))
        .to_options()
        .command("json")
        .help("Run with --json and pretty-print the parsed payload");

    let scaffold = construct!(Cmd::Scaffold(d()))
        .to_options()
        .command("scaffold")
        .help("Create a minimal package.json fixture in a directory");

    /// parses the log path or glob pattern
    fn p() -> impl Parser<String> {
        positional("PATH").help("Log file path or glob pattern")
    }

    let summary = construct!(Cmd::Summary(p()))
        .to_options()
        .command("summary")
        .help("Extract every run summary from log files and tabulate the counts");

    let doctor = pure(Cmd::Doctor)
        .to_options()
        .command("doctor")
        .help("Report which external tools are available");

    let cmd = construct!([run, json, scaffold, summary, doctor]);

    cmd.to_options()
        .descr("End-to-end harness for a Jest-style test runner")
        .run()
}

/// One row of the `summary` command's table.
#[derive(Tabled)]
struct SummaryRow {
    /// Position of the run within the scanned logs.
    #[tabled(rename = "Run")]
    run:       usize,
    /// `passed/total` test suites.
    #[tabled(rename = "Suites")]
    suites:    String,
    /// `passed/total` tests.
    #[tabled(rename = "Tests")]
    tests:     String,
    /// Snapshot total.
    #[tabled(rename = "Snapshots")]
    snapshots: u64,
    /// Raw time text (normally already normalized).
    #[tabled(rename = "Time")]
    time:      String,
}

/// Extracts and tabulates every summary recorded in the files matching
/// `pattern`.
fn tabulate_summaries(pattern: &str) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let logs = if PathBuf::from(pattern).is_file() {
        vec![PathBuf::from(pattern)]
    } else {
        find_files(pattern, &cwd)?
    };
    anyhow::ensure!(!logs.is_empty(), "no log files match `{pattern}`");

    let mut rows = Vec::new();
    for log in &logs {
        let text = std::fs::read_to_string(log)
            .with_context(|| format!("failed to read {}", log.display()))?;
        for summary in extract_summaries(&text)? {
            let counts = parse_counts(&summary.summary)?;
            rows.push(SummaryRow {
                run:       rows.len() + 1,
                suites:    format!("{}/{}", counts.suites.passed, counts.suites.total),
                tests:     format!("{}/{}", counts.tests.passed, counts.tests.total),
                snapshots: counts.snapshots.total,
                time:      counts.time,
            });
        }
    }
    anyhow::ensure!(!rows.is_empty(), "no summary blocks found in the matched logs");

    println!("{}", Table::new(&rows).with(Style::sharp()));
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options();

    match cmd {
        Cmd::Run(dir, args) => {
            let runner = TestRunner::from_config()?;
            let options = RunnerOptions::builder().strip_ansi(true).build();
            let run = runner.run(&dir, &args, &options)?;
            if !run.stdout.is_empty() {
                println!("{}", run.stdout);
            }
            if !run.stderr.is_empty() {
                eprintln!("{}", run.stderr);
            }
            eprintln!("exit code: {}", run.exit_code);
        }
        Cmd::Json(dir, args) => {
            let runner = TestRunner::from_config()?;
            let options = RunnerOptions::builder().strip_ansi(true).build();
            let (_, payload) = runner.run_json(&dir, &args, &options)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render payload")?
            );
        }
        Cmd::Scaffold(dir) => {
            create_empty_package(&dir, None)?;
            println!("created {}", dir.join("package.json").display());
        }
        Cmd::Summary(pattern) => tabulate_summaries(&pattern)?,
        Cmd::Doctor => {
            for (tool, available) in capability::capabilities().statuses() {
                let verdict = if available { "found" } else { "MISSING" };
                println!("{tool:<12} {verdict}");
            }
        }
    };

    Ok(())
}
