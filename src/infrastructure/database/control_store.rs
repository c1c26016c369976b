//! SQLite implementation of the control store.
//!
//! Upserts replace whole rows keyed by id; the `agent_key` unique
//! constraint is enforced with a targeted `ON CONFLICT(id)` clause so a
//! duplicate key under a different id fails instead of silently evicting
//! the other agent's row.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentStatus, AuditEntry, AuditQuery, Task, TaskEvent, TaskStatus};
use crate::domain::ports::ControlStore;

use super::utils::{format_opt_ts, format_ts, parse_opt_ts, parse_ts};

/// Default page size for event and audit listings.
const DEFAULT_LIST_LIMIT: u32 = 200;
/// Hard cap for event and audit listings.
const MAX_LIST_LIMIT: u32 = 2000;

/// Clamp a caller-supplied limit to [1, 2000]; 0 selects the default.
fn clamp_list_limit(limit: u32) -> u32 {
    if limit == 0 {
        DEFAULT_LIST_LIMIT
    } else {
        limit.clamp(1, MAX_LIST_LIMIT)
    }
}

pub struct SqliteControlStore {
    pool: SqlitePool,
}

impl SqliteControlStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_agent(row: &SqliteRow) -> DomainResult<Agent> {
        let status_raw: String = row.get("status");
        let status = AgentStatus::parse_str(&status_raw)
            .ok_or_else(|| DomainError::Storage(format!("unknown agent status {status_raw:?}")))?;

        Ok(Agent {
            id: row.get("id"),
            agent_key: row.get("agent_key"),
            hostname: row.get("hostname"),
            version: row.get("version"),
            ip: row.get("ip"),
            group_name: row.get("group_name"),
            status,
            last_seen_at: parse_ts(row.get::<String, _>("last_seen_at").as_str())?,
            heartbeat_count: row.get::<i64, _>("heartbeat_count") as u64,
            created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_ts(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    fn row_to_task(row: &SqliteRow) -> DomainResult<Task> {
        let status_raw: String = row.get("status");
        let status = TaskStatus::parse_str(&status_raw)
            .ok_or_else(|| DomainError::Storage(format!("unknown task status {status_raw:?}")))?;

        let payload: HashMap<String, serde_json::Value> =
            serde_json::from_str(row.get::<String, _>("payload").as_str()).unwrap_or_default();

        Ok(Task {
            id: row.get("id"),
            task_type: row.get("task_type"),
            target: row.get("target"),
            payload,
            priority: row.get("priority"),
            status,
            assigned_agent_id: row.get("assigned_agent_id"),
            retry_count: row.get::<i64, _>("retry_count") as u32,
            max_retries: row.get::<i64, _>("max_retries") as u32,
            created_by: row.get("created_by"),
            failure_reason: row.get("failure_reason"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_ts(row.get::<String, _>("updated_at").as_str())?,
            finished_at: parse_opt_ts(row.get::<String, _>("finished_at").as_str())?,
        })
    }

    fn row_to_event(row: &SqliteRow) -> DomainResult<TaskEvent> {
        Ok(TaskEvent {
            id: row.get("id"),
            task_id: row.get("task_id"),
            agent_id: row.get("agent_id"),
            event_type: row.get("event_type"),
            message: row.get("message"),
            event_time: parse_ts(row.get::<String, _>("event_time").as_str())?,
        })
    }

    fn row_to_audit(row: &SqliteRow) -> DomainResult<AuditEntry> {
        let detail: HashMap<String, serde_json::Value> =
            serde_json::from_str(row.get::<String, _>("detail").as_str()).unwrap_or_default();

        Ok(AuditEntry {
            id: row.get("id"),
            operator: row.get("operator"),
            action: row.get("action"),
            resource_type: row.get("resource_type"),
            resource_id: row.get("resource_id"),
            detail,
            created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
        })
    }
}

#[async_trait]
impl ControlStore for SqliteControlStore {
    async fn upsert_agent(&self, agent: &Agent) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO control_agents
                  (id, agent_key, hostname, version, ip, group_name, status,
                   last_seen_at, heartbeat_count, created_at, updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                  agent_key = excluded.agent_key,
                  hostname = excluded.hostname,
                  version = excluded.version,
                  ip = excluded.ip,
                  group_name = excluded.group_name,
                  status = excluded.status,
                  last_seen_at = excluded.last_seen_at,
                  heartbeat_count = excluded.heartbeat_count,
                  created_at = excluded.created_at,
                  updated_at = excluded.updated_at",
        )
        .bind(&agent.id)
        .bind(&agent.agent_key)
        .bind(&agent.hostname)
        .bind(&agent.version)
        .bind(&agent.ip)
        .bind(&agent.group_name)
        .bind(agent.status.as_str())
        .bind(format_ts(agent.last_seen_at))
        .bind(agent.heartbeat_count as i64)
        .bind(format_ts(agent.created_at))
        .bind(format_ts(agent.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_task(&self, task: &Task) -> DomainResult<()> {
        let payload = serde_json::to_string(&task.payload)
            .map_err(|e| DomainError::Storage(format!("payload encode failed: {e}")))?;

        sqlx::query(
            r"INSERT INTO control_tasks
                  (id, task_type, target, payload, priority, status,
                   assigned_agent_id, retry_count, max_retries, created_by,
                   failure_reason, created_at, updated_at, finished_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                  task_type = excluded.task_type,
                  target = excluded.target,
                  payload = excluded.payload,
                  priority = excluded.priority,
                  status = excluded.status,
                  assigned_agent_id = excluded.assigned_agent_id,
                  retry_count = excluded.retry_count,
                  max_retries = excluded.max_retries,
                  created_by = excluded.created_by,
                  failure_reason = excluded.failure_reason,
                  created_at = excluded.created_at,
                  updated_at = excluded.updated_at,
                  finished_at = excluded.finished_at",
        )
        .bind(&task.id)
        .bind(&task.task_type)
        .bind(&task.target)
        .bind(payload)
        .bind(&task.priority)
        .bind(task.status.as_str())
        .bind(&task.assigned_agent_id)
        .bind(i64::from(task.retry_count))
        .bind(i64::from(task.max_retries))
        .bind(&task.created_by)
        .bind(&task.failure_reason)
        .bind(format_ts(task.created_at))
        .bind(format_ts(task.updated_at))
        .bind(format_opt_ts(task.finished_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_agents(&self) -> DomainResult<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM control_agents ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_agent).collect()
    }

    async fn load_tasks(&self) -> DomainResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM control_tasks ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn insert_task_event(&self, event: &TaskEvent) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO control_task_events (task_id, agent_id, event_type, message, event_time)
              VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&event.task_id)
        .bind(&event.agent_id)
        .bind(&event.event_type)
        .bind(&event.message)
        .bind(format_ts(event.event_time))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_audit_log(&self, entry: &AuditEntry) -> DomainResult<()> {
        let detail = serde_json::to_string(&entry.detail)
            .map_err(|e| DomainError::Storage(format!("detail encode failed: {e}")))?;

        sqlx::query(
            r"INSERT INTO control_audit_logs (operator, action, resource_type, resource_id, detail, created_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.operator)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(detail)
        .bind(format_ts(entry.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_task_events(&self, task_id: &str, limit: u32) -> DomainResult<Vec<TaskEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM control_task_events WHERE task_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(task_id)
        .bind(i64::from(clamp_list_limit(limit)))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn list_audit_logs(&self, query: &AuditQuery) -> DomainResult<Vec<AuditEntry>> {
        let mut sql = String::from("SELECT * FROM control_audit_logs WHERE 1 = 1");
        if query.resource_type.is_some() {
            sql.push_str(" AND resource_type = ?");
        }
        if query.resource_id.is_some() {
            sql.push_str(" AND resource_id = ?");
        }
        if query.operator.is_some() {
            sql.push_str(" AND operator = ?");
        }
        if query.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        if query.from.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if query.to.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");

        let mut q = sqlx::query(&sql);
        if let Some(v) = &query.resource_type {
            q = q.bind(v);
        }
        if let Some(v) = &query.resource_id {
            q = q.bind(v);
        }
        if let Some(v) = &query.operator {
            q = q.bind(v);
        }
        if let Some(v) = &query.action {
            q = q.bind(v);
        }
        if let Some(v) = query.from {
            q = q.bind(format_ts(v));
        }
        if let Some(v) = query.to {
            q = q.bind(format_ts(v));
        }
        q = q.bind(i64::from(clamp_list_limit(query.limit)));

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_audit).collect()
    }
}
