//! Result types for the AI log-summary pipeline.

use serde::{Deserialize, Serialize};

/// Maximum key-error lines in a normalized result.
pub const MAX_KEY_ERRORS: usize = 5;
/// Maximum causes in a normalized result.
pub const MAX_CAUSES: usize = 3;
/// Maximum suggestions in a normalized result.
pub const MAX_SUGGESTIONS: usize = 3;

/// Summary shown when the model produced no usable text.
pub const DEFAULT_SUMMARY: &str = "未获取到有效摘要";

/// Canonical severity of a log summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a model-supplied severity, accepting locale synonyms.
    /// Anything unrecognized is `None`; the normalizer defaults it.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "低" => Some(Self::Low),
            "medium" | "中" => Some(Self::Medium),
            "high" | "高" => Some(Self::High),
            _ => None,
        }
    }
}

/// Stable categorical tag attached to AI failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Network,
    RateLimit,
    Auth,
    Upstream5xx,
    Upstream4xx,
    ParseError,
    RequestError,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Upstream5xx => "upstream_5xx",
            Self::Upstream4xx => "upstream_4xx",
            Self::ParseError => "parse_error",
            Self::RequestError => "request_error",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a shrunken-context retry can plausibly help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network | Self::Upstream5xx | Self::RateLimit
        )
    }
}

/// Structured analysis of a log sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub summary: String,
    pub severity: Severity,
    pub key_errors: Vec<String>,
    pub causes: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Metadata about how the analysis was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMeta {
    pub used_lines: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
    pub retries: u32,
    pub degraded: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error_class: String,
}

/// Analysis plus meta, as returned by the HTTP surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEnvelope {
    pub analysis: LogSummary,
    pub meta: SummaryMeta,
}

/// Request accepted by the summary endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryRequest {
    pub path: String,
    /// `tail` (default) or `search`.
    pub mode: String,
    pub query: String,
    pub limit: i64,
    pub case_sensitive: bool,
}

/// Model output before normalization. Lenient on purpose: the model is
/// adversarial and every field may be missing or malformed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSummary {
    pub summary: String,
    pub severity: String,
    #[serde(alias = "key_errors")]
    pub key_errors: Vec<String>,
    pub causes: Vec<String>,
    pub suggestions: Vec<String>,
    pub confidence: Option<f64>,
}

/// Coerce a raw model result into the canonical output domain.
pub fn normalize_summary(raw: RawSummary) -> LogSummary {
    let summary = {
        let trimmed = raw.summary.trim();
        if trimmed.is_empty() {
            DEFAULT_SUMMARY.to_string()
        } else {
            trimmed.to_string()
        }
    };

    let severity = Severity::parse_lenient(&raw.severity).unwrap_or(Severity::Medium);

    let confidence = raw
        .confidence
        .filter(|c| c.is_finite() && (0.0..=1.0).contains(c));

    LogSummary {
        summary,
        severity,
        key_errors: clamp_items(raw.key_errors, MAX_KEY_ERRORS),
        causes: clamp_items(raw.causes, MAX_CAUSES),
        suggestions: clamp_items(raw.suggestions, MAX_SUGGESTIONS),
        confidence,
    }
}

fn clamp_items(items: Vec<String>, cap: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(cap)
        .collect()
}

/// Parse model content as JSON, rescuing a `{...}` substring when the
/// model wrapped the object in prose or code fences.
pub fn parse_model_content(content: &str) -> Option<RawSummary> {
    if let Ok(raw) = serde_json::from_str::<RawSummary>(content) {
        return Some(raw);
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}
