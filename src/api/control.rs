//! Control-plane handlers: agents, tasks, dispatch, audit.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{AgentStatus, AuditQuery, TaskStatus};
use crate::services::failure_reasons::{parse_status_filter, FailureReasonFilter};
use crate::services::{
    AckRequest, AgentFilter, CompleteRequest, CreateTaskRequest, HeartbeatRequest,
    ProgressRequest, PullRequest, RegisterAgentRequest, TaskFilter,
};

use super::error::ApiResult;
use super::AppState;

/// Operator label for console-initiated actions; there is no auth layer
/// in the core, so the label is fixed.
const CONSOLE_OPERATOR: &str = "console";

pub async fn healthz() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "logwarden",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ----- agents ---------------------------------------------------------------

pub async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> ApiResult<Json<Value>> {
    let (agent, created) = state.dispatcher.register_agent(req).await?;
    Ok(Json(json!({ "ok": true, "agent": agent, "created": created })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgentListQuery {
    status: String,
    group: String,
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentListQuery>,
) -> ApiResult<Json<Value>> {
    let status = parse_enum_param(&query.status, AgentStatus::parse_str, "status")?;
    let filter = AgentFilter {
        status,
        group: non_empty(&query.group),
    };
    let items = state.dispatcher.list_agents(filter).await;
    Ok(Json(json!({ "ok": true, "items": items })))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let agent = state.dispatcher.get_agent(&id).await?;
    Ok(Json(json!({ "ok": true, "agent": agent })))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Option<Json<HeartbeatRequest>>,
) -> ApiResult<Json<Value>> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let agent = state.dispatcher.heartbeat(&id, req).await?;
    Ok(Json(json!({ "ok": true, "agent": agent })))
}

pub async fn drain_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let agent = state.dispatcher.drain_agent(&id).await?;
    Ok(Json(json!({ "ok": true, "agent": agent })))
}

// ----- tasks ----------------------------------------------------------------

pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.create_task(req).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TaskListQuery {
    status: String,
    #[serde(rename = "type")]
    task_type: String,
    limit: u32,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<Value>> {
    let status = parse_enum_param(&query.status, TaskStatus::parse_str, "status")?;
    let filter = TaskFilter {
        status,
        task_type: non_empty(&query.task_type),
        limit: query.limit,
    };
    let items = state.dispatcher.list_tasks(filter).await;
    Ok(Json(json!({ "ok": true, "items": items })))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.get_task(&id).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.cancel_task(&id, CONSOLE_OPERATOR).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

pub async fn retry_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.retry_task(&id, CONSOLE_OPERATOR).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventListQuery {
    limit: u32,
}

pub async fn task_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<Json<Value>> {
    let items = state.dispatcher.task_events(&id, query.limit).await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FailureReasonQuery {
    status: String,
    #[serde(rename = "type")]
    task_type: String,
    limit: u32,
}

pub async fn failure_reasons(
    State(state): State<AppState>,
    Query(query): Query<FailureReasonQuery>,
) -> ApiResult<Json<Value>> {
    let filter = FailureReasonFilter {
        statuses: parse_status_filter(&query.status)?,
        task_type: non_empty(&query.task_type),
        limit: query.limit,
    };
    let report = state.dispatcher.failure_reasons(filter).await;
    Ok(Json(json!({ "ok": true, "items": report.items, "total": report.total })))
}

// ----- dispatch -------------------------------------------------------------

pub async fn pull(
    State(state): State<AppState>,
    Json(req): Json<PullRequest>,
) -> ApiResult<Json<Value>> {
    let items = state.dispatcher.pull(req).await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

pub async fn ack_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AckRequest>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.ack(&id, req).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

pub async fn progress_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.progress(&id, req).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<Json<Value>> {
    let task = state.dispatcher.complete(&id, req).await?;
    Ok(Json(json!({ "ok": true, "task": task })))
}

// ----- audit ----------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditLogQuery {
    resource_type: String,
    resource_id: String,
    operator: String,
    action: String,
    from: String,
    to: String,
    limit: u32,
}

pub async fn audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Value>> {
    let audit_query = AuditQuery {
        resource_type: non_empty(&query.resource_type),
        resource_id: non_empty(&query.resource_id),
        operator: non_empty(&query.operator),
        action: non_empty(&query.action),
        from: parse_time_param(&query.from)?,
        to: parse_time_param(&query.to)?,
        limit: query.limit,
    };
    let items = state.dispatcher.audit_logs(audit_query).await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

// ----- helpers --------------------------------------------------------------

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_enum_param<T>(
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    name: &str,
) -> DomainResult<Option<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse(trimmed)
        .map(Some)
        .ok_or_else(|| DomainError::invalid(format!("unknown {name} {trimmed:?}")))
}

/// Accept RFC3339 or the dashboard's `YYYY-MM-DDTHH:MM` shorthand.
fn parse_time_param(raw: &str) -> DomainResult<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(Some(DateTime::from_naive_utc_and_offset(naive, Utc)));
    }
    Err(DomainError::invalid(format!("invalid time value {raw:?}")))
}
