//! Task domain model and state machine.
//!
//! A task is one unit of dispatched work. Transitions are validated
//! against a fixed table; the dispatcher is the only writer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task in the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for an agent to pull it.
    Pending,
    /// Handed to an agent, not yet acknowledged.
    Assigned,
    /// Acknowledged and executing on the owning agent.
    Running,
    /// Finished successfully (terminal).
    Success,
    /// Finished with an error (terminal).
    Failed,
    /// Reclaimed after the run deadline with no retry budget left (terminal).
    Timeout,
    /// Canceled by an operator (terminal).
    Canceled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "timeout" => Some(Self::Timeout),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Terminal states never leave except via an operator retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Timeout | Self::Canceled)
    }

    /// Valid transitions from this status.
    ///
    /// The terminal→pending edges are the operator retry path; the
    /// assigned/running→pending edges are timeout reclamation.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Canceled],
            Self::Assigned => &[Self::Running, Self::Pending, Self::Canceled],
            Self::Running => &[
                Self::Success,
                Self::Failed,
                Self::Pending,
                Self::Timeout,
                Self::Canceled,
            ],
            Self::Success => &[],
            Self::Failed | Self::Timeout | Self::Canceled => &[Self::Pending],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Assignment weight for a priority label. Unknown labels rank as normal.
pub fn priority_weight(priority: &str) -> u8 {
    match priority {
        "high" => 3,
        "low" => 1,
        _ => 2,
    }
}

/// A unit of work dispatched to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// System-assigned id (`tsk-` + sequence).
    pub id: String,
    /// Work category, matched against an agent's accept set on pull.
    #[serde(rename = "type")]
    pub task_type: String,
    /// What the work applies to, e.g. a log path.
    pub target: String,
    /// Free-form scalar payload handed to the agent verbatim.
    pub payload: HashMap<String, serde_json::Value>,
    /// `low` | `normal` | `high`; unknown labels rank as normal.
    pub priority: String,
    pub status: TaskStatus,
    /// Owning agent while assigned/running, empty otherwise.
    pub assigned_agent_id: String,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_by: String,
    /// Reason recorded on terminal failure, empty otherwise.
    pub failure_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether an operator retry is currently allowed.
    pub fn can_retry(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Canceled
        ) && self.retry_count < self.max_retries
    }

    /// The retry transformation: back to pending with one unit of budget
    /// spent and all assignment residue cleared.
    pub fn apply_retry(&mut self, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.status = TaskStatus::Pending;
        self.failure_reason.clear();
        self.assigned_agent_id.clear();
        self.finished_at = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: "tsk-000001".to_string(),
            task_type: "manual_upload".to_string(),
            target: "/var/log/app.log".to_string(),
            payload: HashMap::new(),
            priority: "normal".to_string(),
            status,
            assigned_agent_id: String::new(),
            retry_count: 0,
            max_retries: 3,
            created_by: "console".to_string(),
            failure_reason: String::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    #[test]
    fn terminal_classification() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Timeout.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn lifecycle_edges() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Assigned));
        assert!(TaskStatus::Assigned.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Assigned.can_transition_to(TaskStatus::Pending));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Success));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Pending));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Timeout));
    }

    #[test]
    fn forbidden_edges() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Success));
        assert!(!TaskStatus::Success.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Assigned.can_transition_to(TaskStatus::Success));
    }

    #[test]
    fn cancel_allowed_from_every_non_terminal() {
        for s in [TaskStatus::Pending, TaskStatus::Assigned, TaskStatus::Running] {
            assert!(s.can_transition_to(TaskStatus::Canceled), "{s:?}");
        }
    }

    #[test]
    fn retry_edges_from_terminal_failures() {
        for s in [TaskStatus::Failed, TaskStatus::Timeout, TaskStatus::Canceled] {
            assert!(s.can_transition_to(TaskStatus::Pending), "{s:?}");
        }
        assert!(!TaskStatus::Success.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn priority_weights() {
        assert_eq!(priority_weight("high"), 3);
        assert_eq!(priority_weight("normal"), 2);
        assert_eq!(priority_weight("low"), 1);
        assert_eq!(priority_weight("urgent"), 2);
        assert_eq!(priority_weight(""), 2);
    }

    #[test]
    fn can_retry_requires_budget_and_terminal_failure() {
        let mut t = task(TaskStatus::Failed);
        assert!(t.can_retry());
        t.retry_count = 3;
        assert!(!t.can_retry());

        assert!(!task(TaskStatus::Running).can_retry());
        assert!(!task(TaskStatus::Success).can_retry());
    }

    #[test]
    fn apply_retry_clears_assignment_residue() {
        let mut t = task(TaskStatus::Timeout);
        t.assigned_agent_id = "agt-000001".to_string();
        t.failure_reason = "run_timeout".to_string();
        t.finished_at = Some(Utc::now());

        let now = Utc::now();
        t.apply_retry(now);

        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.retry_count, 1);
        assert!(t.assigned_agent_id.is_empty());
        assert!(t.failure_reason.is_empty());
        assert!(t.finished_at.is_none());
        assert_eq!(t.updated_at, now);
    }

    #[test]
    fn status_parse_accepts_both_cancel_spellings() {
        assert_eq!(TaskStatus::parse_str("canceled"), Some(TaskStatus::Canceled));
        assert_eq!(TaskStatus::parse_str("cancelled"), Some(TaskStatus::Canceled));
        assert_eq!(TaskStatus::parse_str("bogus"), None);
    }
}
