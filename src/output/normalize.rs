use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;

use crate::constants::{DEFAULT_ICON_PAIRS, ESTIMATED_SUFFIX, REPLACEMENT_TOKEN, SEED_REPLACEMENT};

/// Compiled pattern for seed lines: the label, its fixed eight-space field
/// padding, then an optional-sign integer.
fn seed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Seed: {8}-?\d+").expect("seed pattern is valid"))
}

/// Compiled pattern for duration tokens like `1.23s`, `450ms`, or `3 s`.
fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d*\.?\d+ ?m?s\b").expect("time pattern is valid"))
}

/// Compiled pattern for ANSI CSI escape sequences.
fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ansi pattern is valid"))
}

/// Compiled pattern for runs of literal backslash-n / backslash-r pairs.
fn escaped_newline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:\\[nr])+").expect("escaped newline pattern is valid"))
}

/// Rewrites every seed line's value to the canonical placeholder. The
/// runner prints the seed in a fixed-width field, so the label padding is
/// part of the match.
pub fn replace_seed(text: &str) -> String {
    seed_pattern().replace_all(text, SEED_REPLACEMENT).into_owned()
}

/// Rewrites every duration token to the canonical placeholder, then removes
/// the `, estimated <<REPLACED>>` phrase the first rewrite leaves dangling.
pub fn replace_time(text: &str) -> String {
    time_pattern()
        .replace_all(text, REPLACEMENT_TOKEN)
        .replace(ESTIMATED_SUFFIX, "")
}

/// Trims every line and sorts them lexicographically. Used when the runner's
/// worker scheduling makes line order nondeterministic but content is not.
pub fn sort_lines(text: &str) -> String {
    text.split('\n').map(str::trim).sorted().join("\n")
}

/// Removes ANSI CSI escape sequences (colors, cursor movements).
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern().replace_all(text, "").into_owned()
}

/// Collapses runs of literal `\n`/`\r` two-character sequences into one real
/// newline, so line-anchored scanning works on output that was JSON-escaped
/// somewhere upstream.
pub fn collapse_escaped_newlines(text: &str) -> String {
    escaped_newline_pattern().replace_all(text, "\n").into_owned()
}

/// Glyph table mapping terminal-variant status glyphs to canonical forms.
///
/// The default pairs cover the cross and check marks; environments with
/// other glyph quirks supply their own table.
#[derive(Debug, Clone)]
pub struct IconMap {
    /// `(variant, canonical)` pairs applied per character.
    pairs: Vec<(char, char)>,
}

impl Default for IconMap {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_ICON_PAIRS.to_vec(),
        }
    }
}

impl IconMap {
    /// Builds a table from the given `(variant, canonical)` pairs.
    pub fn new(pairs: impl IntoIterator<Item = (char, char)>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// Rewrites every mapped glyph in `text` to its canonical form.
    pub fn apply(&self, text: &str) -> String {
        text.chars()
            .map(|c| {
                self.pairs
                    .iter()
                    .find(|(variant, _)| *variant == c)
                    .map(|(_, canonical)| *canonical)
                    .unwrap_or(c)
            })
            .collect()
    }
}

/// Rewrites status glyphs using the default table.
pub fn normalize_icons(text: &str) -> String {
    IconMap::default().apply(text)
}
