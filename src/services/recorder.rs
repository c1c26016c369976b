//! Event and audit recorder.
//!
//! Appends are best-effort: once the task state itself is persisted, a
//! lost event or audit row is less harmful than failing the request, so
//! store errors here are logged and swallowed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::models::{AuditEntry, TaskEvent, TaskEventKind};
use crate::domain::ports::ControlStore;

#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn ControlStore>,
}

impl Recorder {
    pub fn new(store: Arc<dyn ControlStore>) -> Self {
        Self { store }
    }

    /// Append a task lifecycle event.
    pub async fn task_event(
        &self,
        task_id: &str,
        agent_id: &str,
        kind: TaskEventKind,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        let event = TaskEvent::new(task_id, agent_id, kind, message, at);
        if let Err(err) = self.store.insert_task_event(&event).await {
            warn!(task_id, event_type = kind.as_str(), %err, "failed to record task event");
        }
    }

    /// Append an audit entry.
    pub async fn audit(
        &self,
        operator: &str,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        detail: HashMap<String, serde_json::Value>,
        at: DateTime<Utc>,
    ) {
        let entry = AuditEntry::new(operator, action, resource_type, resource_id, detail, at);
        if let Err(err) = self.store.insert_audit_log(&entry).await {
            warn!(action, resource_id, %err, "failed to record audit entry");
        }
    }
}
