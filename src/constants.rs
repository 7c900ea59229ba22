#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Placeholder substituted for every nondeterministic token in captured
/// output (durations, seeds) so runs can be compared byte-for-byte.
pub const REPLACEMENT_TOKEN: &str = "<<REPLACED>>";

/// Canonical rewrite of a seed line. The padding is one column narrower than
/// the matched field so the placeholder lines up with the runner's other
/// label columns.
pub const SEED_REPLACEMENT: &str = "Seed:       <<REPLACED>>";

/// The `, estimated <<REPLACED>>` phrase left dangling after duration
/// replacement, removed wholesale by `replace_time`.
pub const ESTIMATED_SUFFIX: &str = ", estimated <<REPLACED>>";

/// Status tokens that open a per-suite chunk in runner output.
pub const STATUS_TOKENS: [&str; 3] = ["RUNS", "PASS", "FAIL"];

/// Label opening the first mandatory line of a summary block.
pub const SUITES_LABEL: &str = "Test Suites:";

/// Label prefix of the second mandatory summary line.
pub const TESTS_LABEL: &str = "Tests";

/// Label prefix of the third mandatory summary line.
pub const SNAPSHOTS_LABEL: &str = "Snapshots";

/// Label prefix of the fourth mandatory summary line.
pub const TIME_LABEL: &str = "Time";

/// Label prefix of the optional seed line above a summary block.
pub const SEED_LABEL: &str = "Seed:";

/// Prefix of the optional tail line(s) after a summary block.
pub const RAN_ALL_LABEL: &str = "Ran all test suites";

/// `description` field stamped into every synthesized package.json so stray
/// fixtures are recognizable in a working tree.
pub const AUTOGENERATED_NOTICE: &str =
    "THIS IS AN AUTOGENERATED FILE AND SHOULD NOT BE ADDED TO GIT";

/// Default glyph rewrites applied to captured streams. Some terminals render
/// the multiplication sign and square root where others render the dedicated
/// cross and check marks; both pairs collapse to the latter.
pub const DEFAULT_ICON_PAIRS: [(char, char); 2] = [('\u{00D7}', '\u{2715}'), ('\u{221A}', '\u{2713}')];

/// Number of generated fixture files beyond the first; enough to push the
/// runner into its multi-worker path.
pub const WORKER_FIXTURE_COUNT: usize = 25;

/// Binary name used to locate the runner when no override is configured.
pub const DEFAULT_RUNNER_NAME: &str = "jest";

/// Package manager used for fixture dependency installs.
pub const DEFAULT_PACKAGE_MANAGER: &str = "yarn";

/// Lockfile consulted (and created when absent) by the install helper.
pub const LOCKFILE_NAME: &str = "yarn.lock";

/// Environment variable overriding the runner binary (a path, or a name to
/// look up on PATH).
pub const ENV_RUNNER: &str = "PROCTOR_RUNNER";

/// Environment variable overriding the package-manager binary.
pub const ENV_PACKAGE_MANAGER: &str = "PROCTOR_PACKAGE_MANAGER";

/// Environment variable overriding the local packages directory used by
/// `fixture::link_package`.
pub const ENV_PACKAGES_DIR: &str = "PROCTOR_PACKAGES_DIR";

/// Environment variable overriding the one-shot subprocess deadline, in
/// seconds.
pub const ENV_RUN_TIMEOUT_SECS: &str = "PROCTOR_RUN_TIMEOUT_SECS";

/// Environment variable overriding the watch-mode wait deadline, in seconds.
pub const ENV_WATCH_TIMEOUT_SECS: &str = "PROCTOR_WATCH_TIMEOUT_SECS";
