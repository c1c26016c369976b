//! Agent domain model.
//!
//! An agent is a registered worker endpoint that pulls tasks. Agents are
//! created on first registration, updated forever after, and never
//! deleted by the core.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Connection status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Reachable and eligible for assignment.
    Online,
    /// Missed heartbeats; not considered for assignment.
    Offline,
    /// Operator-requested removal from assignment consideration.
    Draining,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Online
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Draining => "draining",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "draining" => Some(Self::Draining),
            _ => None,
        }
    }
}

/// A registered worker endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// System-assigned id (`agt-` + sequence).
    pub id: String,
    /// Operator-supplied unique key; idempotency key for re-registration.
    pub agent_key: String,
    pub hostname: String,
    pub version: String,
    pub ip: String,
    /// Assignment group, `"default"` when unset.
    pub group_name: String,
    pub status: AgentStatus,
    pub last_seen_at: DateTime<Utc>,
    pub heartbeat_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Whether this agent may receive assignments right now.
    ///
    /// Draining excludes an agent outright; otherwise it must not be
    /// offline and must have been seen within `offline_after`.
    pub fn active_for_selection(&self, now: DateTime<Utc>, offline_after: Duration) -> bool {
        if self.status != AgentStatus::Online {
            return false;
        }
        now.signed_duration_since(self.last_seen_at) <= offline_after
    }
}
