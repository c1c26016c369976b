//! Append-only task event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a task lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    /// Handed to an agent by a pull.
    Assigned,
    /// Acknowledged by the owning agent.
    Started,
    /// Progress report from the owning agent.
    Progress,
    /// Reverted to pending because the agent never acknowledged.
    AssignTimeout,
    /// Run deadline exceeded (requeued or finalized).
    Timeout,
    Succeeded,
    Failed,
}

impl TaskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Started => "started",
            Self::Progress => "progress",
            Self::AssignTimeout => "assign_timeout",
            Self::Timeout => "timeout",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// One append-only record of a task transition. Never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Auto-increment row id; 0 before insertion.
    pub id: i64,
    pub task_id: String,
    /// Agent involved in the transition, empty for core-driven ones.
    pub agent_id: String,
    pub event_type: String,
    pub message: String,
    pub event_time: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        kind: TaskEventKind,
        message: impl Into<String>,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            event_type: kind.as_str().to_string(),
            message: message.into(),
            event_time,
        }
    }
}
