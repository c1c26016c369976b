//! Keyword-window log compression.
//!
//! When a sample exceeds the line budget, keep the lines most likely to
//! matter for fault localization: a tail slice plus a ±2 window around
//! every keyword hit, with trailing bias when even that overflows.

use std::collections::BTreeSet;

/// Fault-indicating keywords, matched case-insensitively as substrings.
pub const KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "exception",
    "panic",
    "timeout",
    "timed out",
    "denied",
    "unauthorized",
    "refused",
    "fatal",
    "oom",
    "out of memory",
    "错误",
    "异常",
    "失败",
    "超时",
    "拒绝",
    "权限",
    "告警",
    "不可用",
    "不可达",
];

/// Lines kept around each keyword hit, before and after.
pub const KEYWORD_WINDOW: usize = 2;

/// Whether a line contains any fault keyword.
pub fn line_matches_keyword(line: &str) -> bool {
    let lower = line.to_lowercase();
    KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Reduce `lines` to at most `limit` entries, in original order.
///
/// Returns the input unchanged when it already fits.
pub fn compress_lines(lines: &[String], limit: usize) -> Vec<String> {
    if limit == 0 || lines.len() <= limit {
        return lines.to_vec();
    }

    let mut tail_count = limit / 3;
    if tail_count < 20 {
        tail_count = 20;
    }
    if tail_count > limit {
        tail_count = limit;
    }

    let mut important: BTreeSet<usize> = BTreeSet::new();
    for idx in lines.len().saturating_sub(tail_count)..lines.len() {
        important.insert(idx);
    }
    for (idx, line) in lines.iter().enumerate() {
        if line_matches_keyword(line) {
            let from = idx.saturating_sub(KEYWORD_WINDOW);
            let to = (idx + KEYWORD_WINDOW).min(lines.len() - 1);
            for j in from..=to {
                important.insert(j);
            }
        }
    }

    let indices: Vec<usize> = important.into_iter().collect();
    let selected = if indices.len() > limit {
        &indices[indices.len() - limit..]
    } else {
        &indices[..]
    };
    selected.iter().map(|&i| lines[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn keyword_matching_is_case_insensitive_and_bilingual() {
        assert!(line_matches_keyword("request FAILED with code 7"));
        assert!(line_matches_keyword("磁盘写入 错误"));
        assert!(line_matches_keyword("Out Of Memory killer invoked"));
        assert!(!line_matches_keyword("all systems nominal"));
    }

    #[test]
    fn short_input_passes_through() {
        let lines = numbered(50);
        assert_eq!(compress_lines(&lines, 100), lines);
        assert_eq!(compress_lines(&lines, 50), lines);
    }

    #[test]
    fn keeps_tail_when_nothing_matches() {
        let lines = numbered(300);
        let out = compress_lines(&lines, 90);
        // tail_count = 30, no keyword hits anywhere.
        assert_eq!(out.len(), 30);
        assert_eq!(out[0], "line 270");
        assert_eq!(out[29], "line 299");
    }

    #[test]
    fn keyword_hit_brings_its_window() {
        let mut lines = numbered(300);
        lines[100] = "disk error detected".to_string();
        let out = compress_lines(&lines, 90);

        // Window ±2 around index 100 plus the 30-line tail.
        assert!(out.contains(&"line 98".to_string()));
        assert!(out.contains(&"line 99".to_string()));
        assert!(out.contains(&"disk error detected".to_string()));
        assert!(out.contains(&"line 101".to_string()));
        assert!(out.contains(&"line 102".to_string()));
        assert_eq!(out.len(), 35);

        // Original order preserved: the window precedes the tail.
        assert_eq!(out[0], "line 98");
        assert_eq!(out[34], "line 299");
    }

    #[test]
    fn overflow_keeps_trailing_important_lines() {
        // Every line matches, so all indices are important; the budget
        // keeps the last `limit` of them.
        let lines: Vec<String> = (0..200).map(|i| format!("error {i}")).collect();
        let out = compress_lines(&lines, 50);
        assert_eq!(out.len(), 50);
        assert_eq!(out[0], "error 150");
        assert_eq!(out[49], "error 199");
    }

    #[test]
    fn tail_floor_of_twenty_applies_to_small_budgets() {
        let lines = numbered(100);
        let out = compress_lines(&lines, 30);
        // tail_count = max(30/3, 20) = 20.
        assert_eq!(out.len(), 20);
        assert_eq!(out[0], "line 80");
    }
}
