use std::{ops::Range, sync::OnceLock};

use itertools::Itertools;
use regex::Regex;

use crate::{
    constants::{
        RAN_ALL_LABEL, SEED_LABEL, SNAPSHOTS_LABEL, STATUS_TOKENS, SUITES_LABEL, TESTS_LABEL,
        TIME_LABEL,
    },
    error::HarnessError,
    output::normalize::{collapse_escaped_newlines, replace_time},
};

/// A summary block split from the per-test lines that preceded it.
///
/// `summary` is the matched trailing block with durations normalized; `rest`
/// is everything before it with per-line duration annotations stripped. Both
/// are trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Everything before the block.
    pub rest:    String,
    /// The matched block.
    pub summary: String,
}

/// Compiled pattern for a line-trailing `(<duration>)` annotation, as the
/// runner appends to slow per-test lines.
fn duration_annotation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)\s*\(\d*\.?\d+ ?m?s\b\)$").expect("duration annotation pattern is valid")
    })
}

/// Byte ranges of every line in `text`, terminators excluded. A trailing
/// newline yields a final empty line, mirroring `str::split('\n')`.
fn line_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            spans.push(start..idx);
            start = idx + 1;
        }
    }
    spans.push(start..text.len());
    spans
}

/// Attempts to match a summary block starting at line `i`: an optional seed
/// line, the four fixed-label lines in order, any `Ran all test suites`
/// tail lines, then trailing blank lines. Returns the consumed line range.
fn match_block_at(text: &str, lines: &[Range<usize>], i: usize) -> Option<Range<usize>> {
    let line = |k: usize| &text[lines[k].clone()];

    let mut j = i;
    if line(j).starts_with(SEED_LABEL) {
        j += 1;
    }
    if j + 3 >= lines.len() || !line(j).starts_with(SUITES_LABEL) {
        return None;
    }
    if !line(j + 1).starts_with(TESTS_LABEL)
        || !line(j + 2).starts_with(SNAPSHOTS_LABEL)
        || !line(j + 3).starts_with(TIME_LABEL)
    {
        return None;
    }

    let mut end = j + 4;
    while end < lines.len() && line(end).starts_with(RAN_ALL_LABEL) {
        end += 1;
    }
    while end < lines.len() && line(end).is_empty() {
        end += 1;
    }
    Some(i..end)
}

/// The shared scanner: byte spans of every non-overlapping summary block in
/// `text`, in order. Labels anchor at line starts.
fn summary_spans(text: &str) -> Vec<Range<usize>> {
    let lines = line_spans(text);
    let mut spans = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        match match_block_at(text, &lines, i) {
            Some(line_range) => {
                let start = lines[line_range.start].start;
                let end = if line_range.end < lines.len() {
                    lines[line_range.end].start
                } else {
                    text.len()
                };
                spans.push(start..end);
                i = line_range.end;
            }
            None => i += 1,
        }
    }
    spans
}

/// Splits `text` at its last summary block.
///
/// Escaped newlines are collapsed first so line-anchored scanning works on
/// JSON-escaped output. A missing block is a hard error embedding the full
/// offending text, because every real run ends in exactly one block and its
/// absence means the pipeline is looking at the wrong text.
pub fn extract_summary(text: &str) -> Result<Summary, HarnessError> {
    let collapsed = collapse_escaped_newlines(text);
    let spans = summary_spans(&collapsed);
    let Some(span) = spans.last() else {
        return Err(HarnessError::SummaryMissing {
            output: text.to_string(),
        });
    };

    let block = &collapsed[span.clone()];
    let summary = replace_time(block);

    let mut rest = String::with_capacity(collapsed.len() - block.len());
    rest.push_str(&collapsed[..span.start]);
    rest.push_str(&collapsed[span.end..]);
    let rest = duration_annotation_pattern().replace_all(&rest, "");

    Ok(Summary {
        rest:    rest.trim().to_string(),
        summary: summary.trim().to_string(),
    })
}

/// [`extract_summary`] with `rest` additionally normalized and sorted by
/// suite chunk, for callers whose per-suite lines arrive in worker order.
pub fn extract_sorted_summary(text: &str) -> Result<Summary, HarnessError> {
    let Summary { rest, summary } = extract_summary(text)?;
    Ok(Summary {
        rest: sort_tests(&replace_time(&rest)),
        summary,
    })
}

/// Splits a concatenated multi-run log into one [`Summary`] per recorded
/// run.
///
/// Region `i` runs from the end of block `i - 1` (or the start of the text)
/// to the end of block `i`, so back-to-back blocks produce entries with an
/// empty `rest`. A log with no blocks at all yields an empty vector.
pub fn extract_summaries(text: &str) -> Result<Vec<Summary>, HarnessError> {
    let spans = summary_spans(text);
    let mut summaries = Vec::with_capacity(spans.len());
    let mut region_start = 0;
    for span in &spans {
        let region = &text[region_start..span.end];
        summaries.push(extract_sorted_summary(region)?);
        region_start = span.end;
    }
    Ok(summaries)
}

/// Groups lines into per-suite chunks and sorts the chunks by first line.
///
/// A chunk opens at every line whose first four characters are a status
/// token (`RUNS`, `PASS`, `FAIL`); lines before the first such line form an
/// implicit leading chunk. Multi-line chunks keep their internal order and
/// rejoin with a trailing newline to preserve visual grouping.
pub fn sort_tests(text: &str) -> String {
    let mut chunks: Vec<Vec<&str>> = Vec::new();
    for line in text.split('\n') {
        let opens_chunk = line
            .get(0..4)
            .is_some_and(|head| STATUS_TOKENS.contains(&head));
        if opens_chunk || chunks.is_empty() {
            chunks.push(vec![line]);
        } else if let Some(current) = chunks.last_mut() {
            current.push(line);
        }
    }

    chunks.sort_by(|a, b| a.first().cmp(&b.first()));
    chunks
        .iter()
        .map(|chunk| match chunk.as_slice() {
            [only] => (*only).to_string(),
            lines => format!("{}\n", lines.join("\n").trim_end()),
        })
        .join("\n")
        .trim()
        .to_string()
}
