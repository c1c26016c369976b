//! Chat-completions client.
//!
//! Talks to any OpenAI-compatible endpoint. The base URL is normalized
//! once at construction; each request carries the configured timeout.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::AiConfig;

/// Sampling temperature for summary requests.
const TEMPERATURE: f64 = 0.2;

/// Errors from one model invocation. The rendered message feeds the
/// classifier, so upstream text is preserved verbatim where available.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Transport-level failure: DNS, connect, TLS, timeout.
    #[error("{0}")]
    Transport(String),

    /// Upstream answered with a non-2xx status.
    #[error("upstream status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not decode as a chat completion.
    #[error("failed to decode model response: {0}")]
    Decode(String),

    /// Structurally valid response with no usable choice.
    #[error("model returned no choices")]
    EmptyChoices,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct UpstreamErrorDetail {
    message: String,
}

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &AiConfig) -> DomainResult<Self> {
        Self::with_timeout(config, config.request_timeout())
    }

    pub fn with_timeout(config: &AiConfig, timeout: Duration) -> DomainResult<Self> {
        let endpoint = normalize_endpoint(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::invalid(format!("failed to build AI client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// One chat-completion round trip; returns the first choice's content.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ChatError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": TEMPERATURE,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<UpstreamErrorBody>(&text)
                .ok()
                .map(|b| b.error.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(text);
            return Err(ChatError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ChatError::EmptyChoices)?;
        Ok(content)
    }
}

/// Render an error with its full source chain. reqwest's `Display`
/// hides the cause ("Connection refused", "operation timed out"), and
/// the classifier keys off exactly those phrases.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Normalize a configured base URL into a chat-completions endpoint.
///
/// A path already ending in `/chat/completions` is used as-is; `/v1`
/// gets `/chat/completions` appended; an empty path becomes
/// `/v1/chat/completions`; anything else gets `/chat/completions`
/// appended.
pub fn normalize_endpoint(base_url: &str) -> DomainResult<String> {
    let raw = base_url.trim();
    if raw.is_empty() {
        return Err(DomainError::Disabled("AI base URL is empty".to_string()));
    }
    let mut url = Url::parse(raw)
        .map_err(|e| DomainError::invalid(format!("invalid AI base URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DomainError::invalid(format!(
            "AI base URL must be http(s) with a host: {raw:?}"
        )));
    }

    // `/v1` and any other non-empty path both get the suffix appended;
    // only an empty path needs the `/v1` segment inserted.
    let path = url.path().trim_end_matches('/').to_string();
    let new_path = if path.ends_with("/chat/completions") {
        path
    } else if path.is_empty() {
        "/v1/chat/completions".to_string()
    } else {
        format!("{path}/chat/completions")
    };
    url.set_path(&new_path);
    Ok(url.to_string())
}
