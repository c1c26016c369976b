//! Persistence port for control-plane state.
//!
//! The store owns the durable copies; the dispatcher owns the in-memory
//! maps. Upserts are full-row replaces, never partial updates. Event and
//! audit tables are append-only.

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::models::{Agent, AuditEntry, AuditQuery, Task, TaskEvent};

/// Durable store for agents, tasks, task events, and audit logs.
#[async_trait]
pub trait ControlStore: Send + Sync {
    /// Insert-or-replace an agent row. The unique `agent_key` constraint
    /// rejects duplicate keys under distinct ids.
    async fn upsert_agent(&self, agent: &Agent) -> DomainResult<()>;

    /// Insert-or-replace a task row.
    async fn upsert_task(&self, task: &Task) -> DomainResult<()>;

    /// All agents, most recently updated first.
    async fn load_agents(&self) -> DomainResult<Vec<Agent>>;

    /// All tasks, most recently updated first.
    async fn load_tasks(&self) -> DomainResult<Vec<Task>>;

    /// Append a task event. `event.id` is ignored.
    async fn insert_task_event(&self, event: &TaskEvent) -> DomainResult<()>;

    /// Append an audit entry. `entry.id` is ignored.
    async fn insert_audit_log(&self, entry: &AuditEntry) -> DomainResult<()>;

    /// Events for one task, newest first. The limit is clamped to
    /// [1, 2000]; 0 means the default of 200.
    async fn list_task_events(&self, task_id: &str, limit: u32) -> DomainResult<Vec<TaskEvent>>;

    /// Audit entries matching the query, newest first. Limit clamping as
    /// for [`list_task_events`](Self::list_task_events).
    async fn list_audit_logs(&self, query: &AuditQuery) -> DomainResult<Vec<AuditEntry>>;
}
