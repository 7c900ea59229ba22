use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::constants::{RAN_ALL_LABEL, SEED_LABEL, SNAPSHOTS_LABEL, SUITES_LABEL, TIME_LABEL};

/// One counter category as printed inside a summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    /// `n failed`
    Failed,
    /// `n skipped`
    Skipped,
    /// `n passed`
    Passed,
    /// `n todo`
    Todo,
    /// `n total`
    Total,
}

/// Counters from one summary line. Categories the line omits are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Count printed as `n failed`.
    pub failed:  u64,
    /// Count printed as `n skipped`.
    pub skipped: u64,
    /// Count printed as `n passed`.
    pub passed:  u64,
    /// Count printed as `n todo`.
    pub todo:    u64,
    /// Count printed as `n total`.
    pub total:   u64,
}

impl Tally {
    /// Folds parsed `(count, category)` entries into a tally.
    fn from_entries(entries: Vec<(u64, Category)>) -> Self {
        let mut tally = Self::default();
        for (count, category) in entries {
            match category {
                Category::Failed => tally.failed = count,
                Category::Skipped => tally.skipped = count,
                Category::Passed => tally.passed = count,
                Category::Todo => tally.todo = count,
                Category::Total => tally.total = count,
            }
        }
        tally
    }
}

/// Structured counters parsed out of one summary block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    /// The seed line's value, when present and un-normalized.
    pub seed:      Option<i64>,
    /// The `Test Suites:` line.
    pub suites:    Tally,
    /// The `Tests:` line.
    pub tests:     Tally,
    /// The `Snapshots:` line.
    pub snapshots: Tally,
    /// The `Time:` line's raw text (often already `<<REPLACED>>`).
    pub time:      String,
}

peg::parser! {
    /// Grammars for the individual lines of a summary block.
    grammar summary_line() for str {
        /// matches any sequence of 1 or more numbers
        rule number() -> u64
            = n:$(['0'..='9']+) {? n.parse().or(Err("u64")) }

        /// matches an optional-sign integer
        rule signed() -> i64
            = n:$("-"? ['0'..='9']+) {? n.parse().or(Err("i64")) }

        /// matches the space padding after a label
        rule padding() = quiet!{[' ']+}

        /// parses one counter category keyword
        rule category() -> Category
            = "failed" { Category::Failed }
            / "skipped" { Category::Skipped }
            / "passed" { Category::Passed }
            / "todo" { Category::Todo }
            / "total" { Category::Total }

        /// parses one `n category` entry
        rule entry() -> (u64, Category)
            = n:number() " " c:category() { (n, c) }

        /// parses the comma-separated entry list of a counter line
        rule entries() -> Vec<(u64, Category)>
            = entry() ** ", "

        /// parses and returns the counters of a `Test Suites:` line
        pub rule suites() -> Tally
            = "Test Suites:" padding() e:entries() { Tally::from_entries(e) }

        /// parses and returns the counters of a `Tests:` line
        pub rule tests() -> Tally
            = "Tests:" padding() e:entries() { Tally::from_entries(e) }

        /// parses and returns the counters of a `Snapshots:` line
        pub rule snapshots() -> Tally
            = "Snapshots:" padding() e:entries() { Tally::from_entries(e) }

        /// parses and returns the value of a `Seed:` line
        pub rule seed() -> i64
            = "Seed:" padding() n:signed() { n }

        /// captures the raw text after a `Time:` label
        pub rule time() -> String
            = "Time:" padding() t:$([_]*) { t.trim_end().to_string() }
    }
}

/// Parses the counter lines of one summary block into [`SummaryCounts`].
///
/// Blank lines and `Ran all test suites` tails are skipped; an unrecognized
/// count category or a missing mandatory line is an error naming the
/// offending line.
pub fn parse_counts(block: &str) -> Result<SummaryCounts> {
    let mut counts = SummaryCounts::default();
    let mut saw_suites = false;
    let mut saw_tests = false;
    let mut saw_snapshots = false;
    let mut saw_time = false;

    for line in block.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() || line.starts_with(RAN_ALL_LABEL) {
            continue;
        }

        if line.starts_with(SEED_LABEL) {
            counts.seed = summary_line::seed(line)
                .ok()
                .or(counts.seed);
        } else if line.starts_with(SUITES_LABEL) {
            counts.suites = summary_line::suites(line)
                .with_context(|| format!("unparsable suites line: `{line}`"))?;
            saw_suites = true;
        } else if line.starts_with("Tests:") {
            counts.tests = summary_line::tests(line)
                .with_context(|| format!("unparsable tests line: `{line}`"))?;
            saw_tests = true;
        } else if line.starts_with(SNAPSHOTS_LABEL) {
            counts.snapshots = summary_line::snapshots(line)
                .with_context(|| format!("unparsable snapshots line: `{line}`"))?;
            saw_snapshots = true;
        } else if line.starts_with(TIME_LABEL) {
            counts.time = summary_line::time(line)
                .with_context(|| format!("unparsable time line: `{line}`"))?;
            saw_time = true;
        } else {
            bail!("unexpected line in summary block: `{line}`");
        }
    }

    if !(saw_suites && saw_tests && saw_snapshots && saw_time) {
        bail!("summary block is missing mandatory counter lines:\n{block}");
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_block_with_seed() {
        let block = "Seed:        42\nTest Suites: 1 failed, 2 passed, 3 total\nTests:       1 \
                     failed, 1 todo, 4 passed, 6 total\nSnapshots:   2 total\nTime:        \
                     <<REPLACED>>\nRan all test suites.\n";
        let counts = parse_counts(block).expect("parse");

        assert_eq!(counts.seed, Some(42));
        assert_eq!(counts.suites.failed, 1);
        assert_eq!(counts.suites.passed, 2);
        assert_eq!(counts.suites.total, 3);
        assert_eq!(counts.tests.todo, 1);
        assert_eq!(counts.tests.total, 6);
        assert_eq!(counts.snapshots.total, 2);
        assert_eq!(counts.time, "<<REPLACED>>");
    }

    #[test]
    fn omitted_categories_are_zero() {
        let block = "Test Suites: 1 passed, 1 total\nTests:       1 passed, 1 \
                     total\nSnapshots:   0 total\nTime:        1.2 s\n";
        let counts = parse_counts(block).expect("parse");

        assert_eq!(counts.seed, None);
        assert_eq!(counts.suites.failed, 0);
        assert_eq!(counts.suites.skipped, 0);
        assert_eq!(counts.tests.passed, 1);
        assert_eq!(counts.time, "1.2 s");
    }

    #[test]
    fn a_normalized_seed_stays_unparsed() {
        let block = "Seed:       <<REPLACED>>\nTest Suites: 1 passed, 1 total\nTests:       1 \
                     passed, 1 total\nSnapshots:   0 total\nTime:        <<REPLACED>>\n";
        let counts = parse_counts(block).expect("parse");
        assert_eq!(counts.seed, None);
    }

    #[test]
    fn unknown_categories_are_an_error() {
        let block = "Test Suites: 1 exploded, 1 total\nTests:       1 passed, 1 \
                     total\nSnapshots:   0 total\nTime:        1 s\n";
        assert!(parse_counts(block).is_err());
    }

    #[test]
    fn missing_mandatory_lines_are_an_error() {
        assert!(parse_counts("Test Suites: 1 passed, 1 total\n").is_err());
    }
}
