//! Summary pipeline orchestration.
//!
//! validate → sample → compress → invoke → parse → normalize, with
//! shrinking-context retries on retryable failures and the rule-based
//! fallback on everything else. Callers never see an upstream error:
//! the result is either a model summary or a degraded one.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::Config;

use super::classify::classify;
use super::client::ChatClient;
use super::compress::compress_lines;
use super::fallback::build_fallback;
use super::paths::PathAllowList;
use super::sampler::{search_sample, tail_sample, AI_TAIL_BYTES};
use super::types::{
    normalize_summary, parse_model_content, ErrorClass, LogSummary, SummaryEnvelope, SummaryMeta,
    SummaryRequest,
};

/// Context windows never shrink below this many lines.
pub const RETRY_MIN_LINES: usize = 30;

enum SampleMode {
    Tail,
    Search,
}

pub struct Summarizer {
    config: Arc<Config>,
    allow_list: PathAllowList,
}

impl Summarizer {
    pub fn new(config: Arc<Config>) -> Self {
        let allow_list = PathAllowList::from_config(&config);
        Self { config, allow_list }
    }

    /// Run the full pipeline for one request.
    pub async fn summarize(&self, req: SummaryRequest) -> DomainResult<SummaryEnvelope> {
        let started = Instant::now();
        let ai = &self.config.ai;

        if !ai.enabled {
            return Err(DomainError::Disabled("AI log summary is disabled".to_string()));
        }
        if ai.base_url.trim().is_empty()
            || ai.api_key.trim().is_empty()
            || ai.model.trim().is_empty()
        {
            return Err(DomainError::Disabled(
                "AI log summary is not configured".to_string(),
            ));
        }

        let mode = match req.mode.trim() {
            "" | "tail" => SampleMode::Tail,
            "search" => SampleMode::Search,
            other => {
                return Err(DomainError::invalid(format!(
                    "mode must be tail or search, got {other:?}"
                )))
            }
        };

        let path = self.allow_list.validate(&req.path)?;
        let limit = resolve_line_limit(req.limit, ai.effective_max_lines());

        let (lines, mut truncated) = match mode {
            SampleMode::Tail => {
                let sample = run_blocking({
                    let path = path.clone();
                    move || tail_sample(&path, AI_TAIL_BYTES)
                })
                .await?;
                (sample.lines, sample.truncated)
            }
            SampleMode::Search => {
                let query = req.query.trim().to_string();
                if query.is_empty() {
                    return Err(DomainError::invalid("query is required for search mode"));
                }
                let matches = run_blocking({
                    let path = path.clone();
                    let case_sensitive = req.case_sensitive;
                    move || search_sample(&path, &query, limit, case_sensitive)
                })
                .await?;
                (matches, false)
            }
        };

        let mut window = if lines.len() > limit {
            truncated = true;
            compress_lines(&lines, limit)
        } else {
            lines
        };

        let client = ChatClient::new(ai)?;
        let mut retries: u32 = 0;
        let mut failure: Option<ErrorClass> = None;

        let analysis: LogSummary = loop {
            let user = user_prompt(&path, truncated, &window);
            match client.complete(SYSTEM_PROMPT, &user).await {
                Ok(content) => match parse_model_content(&content) {
                    Some(raw) => break normalize_summary(raw),
                    None => {
                        warn!(path = %path.display(), "model content was not parseable JSON");
                        failure = Some(ErrorClass::ParseError);
                        break build_fallback(&window, ErrorClass::ParseError);
                    }
                },
                Err(err) => {
                    let class = classify(&err.to_string());
                    if class.is_retryable() {
                        let shrunk = (window.len() / 2).max(RETRY_MIN_LINES);
                        if shrunk < window.len() {
                            debug!(
                                %err,
                                class = class.as_str(),
                                from = window.len(),
                                to = shrunk,
                                "retrying with a smaller context window"
                            );
                            window = window.split_off(window.len() - shrunk);
                            truncated = true;
                            retries += 1;
                            continue;
                        }
                    }
                    warn!(%err, class = class.as_str(), "AI summary degraded to rule-based result");
                    failure = Some(class);
                    break build_fallback(&window, class);
                }
            }
        };

        let meta = SummaryMeta {
            used_lines: window.len(),
            truncated,
            elapsed_ms: started.elapsed().as_millis() as u64,
            retries,
            degraded: failure.is_some(),
            error_class: failure.map(|c| c.as_str().to_string()).unwrap_or_default(),
        };
        Ok(SummaryEnvelope { analysis, meta })
    }
}

/// Resolve the requested line limit against the configured ceiling.
fn resolve_line_limit(requested: i64, max_lines: usize) -> usize {
    if requested <= 0 {
        return max_lines;
    }
    (requested as usize).min(max_lines)
}

async fn run_blocking<T, F>(f: F) -> DomainResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DomainResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DomainError::Storage(format!("sampling task failed: {e}")))?
}

const SYSTEM_PROMPT: &str = "你是日志分析助手。阅读用户提供的日志内容，只输出一个 JSON 对象，不要任何其他文本。\
格式：{\"summary\":\"一句话摘要\",\"severity\":\"low|medium|high\",\"keyErrors\":[\"关键错误行，最多5条\"],\
\"causes\":[\"可能原因，最多3条\"],\"suggestions\":[\"处理建议，最多3条\"],\"confidence\":0.0}";

fn user_prompt(path: &Path, truncated: bool, lines: &[String]) -> String {
    let truncation_note = if truncated {
        "（内容已截断，仅保留重要行）\n"
    } else {
        ""
    };
    format!(
        "日志文件: {}\n{}日志内容:\n{}",
        path.display(),
        truncation_note,
        lines.join("\n")
    )
}
