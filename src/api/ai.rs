//! AI log-summary handler.
//!
//! Everything here runs without the dispatcher lock: config and the
//! allow-list are read at startup, sampling happens on the blocking
//! pool, and the model call is plain HTTP client work.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::ai::SummaryRequest;

use super::error::ApiResult;
use super::AppState;

pub async fn log_summary(
    State(state): State<AppState>,
    Json(req): Json<SummaryRequest>,
) -> ApiResult<Json<Value>> {
    let envelope = state.summarizer.summarize(req).await?;
    Ok(Json(json!({
        "ok": true,
        "analysis": envelope.analysis,
        "meta": envelope.meta,
    })))
}
