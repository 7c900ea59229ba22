use std::fmt;

use colored::Colorize;
use similar::{Algorithm, ChangeTag, utils::diff_unicode_words};

/// Caps preview lines at this many bytes before inserting a notice.
const PREVIEW_LIMIT: usize = 160;

/// Truncates `content` to `limit`, cutting at the last full line and
/// appending a notice for the omitted output.
fn truncate_with_notice(content: &str, limit: usize) -> String {
    if content.len() <= limit {
        return content.to_string();
    }

    let mut end = limit;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }

    let mut truncated = content[..end].to_string();
    if let Some(index) = truncated.rfind('\n') {
        truncated.truncate(index);
    }

    truncated.push_str("\n...[TRUNCATED]");
    truncated
}

/// Produces a short single-line preview of `text`, trimmed and capped.
fn preview_trimmed(text: &str) -> String {
    let snippet = text.trim();
    let head = truncate_with_notice(snippet.lines().next().unwrap_or(""), PREVIEW_LIMIT);
    if head.is_empty() {
        "[empty]".to_string()
    } else {
        head
    }
}

/// Renders a colored word-level diff of `expected` against `actual` for
/// terminal display: deletions red on the expected side, insertions green on
/// the actual side.
pub fn render_diff(expected: &str, actual: &str) -> String {
    let diff = diff_unicode_words(Algorithm::Patience, expected, actual);

    let mut colored_expected = String::new();
    let mut colored_actual = String::new();
    for (change, value) in diff {
        match change {
            ChangeTag::Equal => {
                colored_expected.push_str(value);
                colored_actual.push_str(value);
            }
            ChangeTag::Insert => {
                colored_actual.push_str(&format!("{}", value.green()));
            }
            ChangeTag::Delete => {
                colored_expected.push_str(&format!("{}", value.red()));
            }
        }
    }

    format!("Expected:\n{colored_expected}\nActual:\n{colored_actual}\n")
}

/// The first line where captured output diverges from its stored baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineDiff {
    /// Zero-based line index of the first divergence.
    pub line:     usize,
    /// Preview of the baseline's side of the line.
    pub expected: String,
    /// Preview of the captured side of the line.
    pub actual:   String,
}

impl fmt::Display for BaselineDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "first mismatch at line {}:\n  expected: {}\n  actual:   {}",
            self.line + 1,
            self.expected,
            self.actual
        )
    }
}

/// Locates the first differing line between `expected` and `actual`.
///
/// Returns `None` when the texts agree line for line; a length difference
/// alone counts as a mismatch at the shorter side's end.
pub fn first_mismatch(expected: &str, actual: &str) -> Option<BaselineDiff> {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();

    for (index, (left, right)) in expected_lines.iter().zip(actual_lines.iter()).enumerate() {
        if left != right {
            return Some(BaselineDiff {
                line:     index,
                expected: preview_trimmed(left),
                actual:   preview_trimmed(right),
            });
        }
    }

    if expected_lines.len() != actual_lines.len() {
        let index = expected_lines.len().min(actual_lines.len());
        return Some(BaselineDiff {
            line:     index,
            expected: preview_trimmed(expected_lines.get(index).copied().unwrap_or("")),
            actual:   preview_trimmed(actual_lines.get(index).copied().unwrap_or("")),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_texts_have_no_mismatch() {
        assert_eq!(first_mismatch("a\nb\n", "a\nb\n"), None);
    }

    #[test]
    fn first_differing_line_is_reported_with_previews() {
        let found = first_mismatch("PASS a\nPASS b", "PASS a\nFAIL b").expect("mismatch");
        assert_eq!(found.line, 1);
        assert_eq!(found.expected, "PASS b");
        assert_eq!(found.actual, "FAIL b");
    }

    #[test]
    fn a_missing_trailing_line_counts_as_a_mismatch() {
        let found = first_mismatch("only\nextra", "only").expect("mismatch");
        assert_eq!(found.line, 1);
        assert_eq!(found.expected, "extra");
        assert_eq!(found.actual, "[empty]");
    }

    #[test]
    fn render_diff_keeps_equal_segments_on_both_sides() {
        colored::control::set_override(false);
        let rendered = render_diff("Tests: 1 passed", "Tests: 1 failed");
        assert!(rendered.contains("Expected:\nTests: 1 passed"));
        assert!(rendered.contains("Actual:\nTests: 1 failed"));
    }

    #[test]
    fn long_preview_lines_are_truncated_with_a_notice() {
        let long = "x".repeat(PREVIEW_LIMIT * 2);
        let found = first_mismatch(&long, "short").expect("mismatch");
        assert!(found.expected.ends_with("...[TRUNCATED]"));
    }
}
