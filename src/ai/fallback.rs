//! Rule-based degraded summary.
//!
//! Produced whenever the model path fails for any reason: scan the tail
//! for keyword lines, grade severity from a small marker set, and return
//! a fixed operator-facing playbook.

use super::compress::line_matches_keyword;
use super::types::{ErrorClass, LogSummary, Severity};

/// Fallback confidence, deliberately low.
const FALLBACK_CONFIDENCE: f64 = 0.35;

/// Key-error lines retained in a fallback result.
const MAX_FALLBACK_ERRORS: usize = 5;

/// Markers that immediately grade a sample as high severity.
const HIGH_SEVERITY_MARKERS: &[&str] = &[
    "panic",
    "fatal",
    "oom",
    "out of memory",
    "segfault",
    "崩溃",
    "致命",
];

/// Build the degraded result for a sample that never produced a model
/// summary.
pub fn build_fallback(lines: &[String], class: ErrorClass) -> LogSummary {
    // Walk the tail backwards so the most recent hits win, dedup exact
    // lines, then restore chronological order.
    let mut picked: Vec<String> = Vec::new();
    for line in lines.iter().rev() {
        if picked.len() >= MAX_FALLBACK_ERRORS {
            break;
        }
        if line_matches_keyword(line) && !picked.contains(line) {
            picked.push(line.clone());
        }
    }
    picked.reverse();

    let has_high_marker = picked.iter().any(|line| {
        let lower = line.to_lowercase();
        HIGH_SEVERITY_MARKERS.iter().any(|m| lower.contains(m))
    });
    let severity = if has_high_marker || picked.len() >= 3 {
        Severity::High
    } else if picked.is_empty() {
        Severity::Low
    } else {
        Severity::Medium
    };

    LogSummary {
        summary: format!(
            "AI 摘要暂不可用（错误类型: {}），已按规则匹配到 {} 条可疑日志，请人工复核。",
            class.as_str(),
            picked.len()
        ),
        severity,
        key_errors: picked,
        causes: vec![
            "AI 服务不可用或响应异常".to_string(),
            "日志内容可能超出模型可处理范围".to_string(),
        ],
        suggestions: vec![
            "检查 AI 服务配置与网络连通性".to_string(),
            "结合关键错误行进行人工排查".to_string(),
            "稍后重试或缩小日志范围".to_string(),
        ],
        confidence: Some(FALLBACK_CONFIDENCE),
    }
}
