//! Dispatcher core.
//!
//! Authoritative in-memory state for agents and tasks, guarded by one
//! reader/writer lock. Every mutation follows the same order: compute
//! the next state, persist it, publish it to the map, then append the
//! event/audit records. A storage failure aborts before the map is
//! touched, so the database is always at least as new as memory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::ids::{format_id, parse_seq, AGENT_PREFIX, TASK_PREFIX};
use crate::domain::models::audit::SYSTEM_OPERATOR;
use crate::domain::models::config::DispatchConfig;
use crate::domain::models::{
    priority_weight, Agent, AgentStatus, AuditQuery, Task, TaskEvent, TaskEventKind, TaskStatus,
};
use crate::domain::ports::{Clock, ControlStore};
use crate::services::failure_reasons::{aggregate, FailureReasonFilter, FailureReasonReport};
use crate::services::recorder::Recorder;

/// Default maximum retries for a new task.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default creator label for operator-submitted tasks.
const DEFAULT_CREATED_BY: &str = "console";
/// Default and maximum page sizes for task listings.
const DEFAULT_TASK_LIST_LIMIT: u32 = 200;
const MAX_TASK_LIST_LIMIT: u32 = 1000;
/// Bounds for tasks handed out per pull.
const MAX_PULL_TASKS: u32 = 10;

/// Timeout thresholds driving reclamation.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTuning {
    pub assign_timeout: Duration,
    pub run_timeout: Duration,
    pub offline_after: Duration,
}

impl Default for DispatchTuning {
    fn default() -> Self {
        Self {
            assign_timeout: Duration::seconds(30),
            run_timeout: Duration::minutes(10),
            offline_after: Duration::seconds(45),
        }
    }
}

impl From<DispatchConfig> for DispatchTuning {
    fn from(cfg: DispatchConfig) -> Self {
        Self {
            assign_timeout: Duration::seconds(cfg.assign_timeout_secs as i64),
            run_timeout: Duration::seconds(cfg.run_timeout_secs as i64),
            offline_after: Duration::seconds(cfg.offline_after_secs as i64),
        }
    }
}

/// Agent registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterAgentRequest {
    pub agent_key: String,
    pub hostname: String,
    pub version: String,
    pub ip: String,
    pub group_name: String,
}

/// Optional heartbeat payload; non-empty fields overwrite attributes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatRequest {
    pub hostname: String,
    pub version: String,
    pub ip: String,
}

/// Task creation payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTaskRequest {
    #[serde(rename = "type")]
    pub task_type: String,
    pub target: String,
    pub payload: HashMap<String, serde_json::Value>,
    pub priority: String,
    pub created_by: String,
    pub max_retries: i64,
}

/// Pull request from an agent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequest {
    pub agent_id: String,
    pub accept_types: Vec<String>,
    pub max_tasks: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AckRequest {
    pub agent_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRequest {
    pub agent_id: String,
    pub message: String,
    pub progress: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteRequest {
    pub agent_id: String,
    pub status: String,
    pub message: String,
    pub error: String,
}

/// Listing filter for agents.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub status: Option<AgentStatus>,
    pub group: Option<String>,
}

/// Listing filter for tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<String>,
    pub limit: u32,
}

#[derive(Default)]
struct CoreState {
    agents: HashMap<String, Agent>,
    tasks: HashMap<String, Task>,
    /// agentKey → agent id.
    key_index: HashMap<String, String>,
    /// Last used sequence per prefix.
    agent_seq: u64,
    task_seq: u64,
}

/// The control-plane dispatcher.
pub struct Dispatcher {
    store: Arc<dyn ControlStore>,
    clock: Arc<dyn Clock>,
    tuning: DispatchTuning,
    recorder: Recorder,
    state: RwLock<CoreState>,
}

impl Dispatcher {
    /// Reload state from the store and resume id sequences.
    pub async fn load(
        store: Arc<dyn ControlStore>,
        clock: Arc<dyn Clock>,
        tuning: DispatchTuning,
    ) -> DomainResult<Self> {
        let mut state = CoreState::default();

        for agent in store.load_agents().await? {
            if let Some(seq) = parse_seq(AGENT_PREFIX, &agent.id) {
                state.agent_seq = state.agent_seq.max(seq);
            }
            state.key_index.insert(agent.agent_key.clone(), agent.id.clone());
            state.agents.insert(agent.id.clone(), agent);
        }
        for task in store.load_tasks().await? {
            if let Some(seq) = parse_seq(TASK_PREFIX, &task.id) {
                state.task_seq = state.task_seq.max(seq);
            }
            state.tasks.insert(task.id.clone(), task);
        }

        Ok(Self {
            recorder: Recorder::new(store.clone()),
            store,
            clock,
            tuning,
            state: RwLock::new(state),
        })
    }

    // ----- agent operations -------------------------------------------------

    /// Register or re-register an agent. Returns the agent and whether a
    /// new row was created.
    pub async fn register_agent(
        &self,
        req: RegisterAgentRequest,
    ) -> DomainResult<(Agent, bool)> {
        let key = req.agent_key.trim().to_string();
        if key.is_empty() {
            return Err(DomainError::invalid("agentKey is required"));
        }

        let now = self.clock.now();
        let mut state = self.state.write().await;

        let existing = state
            .key_index
            .get(&key)
            .and_then(|id| state.agents.get(id))
            .cloned();
        let created = existing.is_none();

        let mut agent = existing.unwrap_or_else(|| {
            state.agent_seq += 1;
            Agent {
                id: format_id(AGENT_PREFIX, state.agent_seq),
                agent_key: key.clone(),
                hostname: String::new(),
                version: String::new(),
                ip: String::new(),
                group_name: String::new(),
                status: AgentStatus::Online,
                last_seen_at: now,
                heartbeat_count: 0,
                created_at: now,
                updated_at: now,
            }
        });

        agent.hostname = req.hostname.trim().to_string();
        agent.version = req.version.trim().to_string();
        agent.ip = req.ip.trim().to_string();
        agent.group_name = {
            let group = req.group_name.trim();
            if group.is_empty() { "default" } else { group }.to_string()
        };
        if !matches!(agent.status, AgentStatus::Offline | AgentStatus::Draining) {
            agent.status = AgentStatus::Online;
        }
        agent.last_seen_at = now;
        agent.updated_at = now;

        self.store.upsert_agent(&agent).await?;
        state.key_index.insert(key, agent.id.clone());
        state.agents.insert(agent.id.clone(), agent.clone());

        if created {
            self.recorder
                .audit(
                    DEFAULT_CREATED_BY,
                    "agent_register",
                    "agent",
                    &agent.id,
                    HashMap::from([("agentKey".to_string(), json!(agent.agent_key))]),
                    now,
                )
                .await;
        }
        Ok((agent, created))
    }

    /// Record a heartbeat, optionally refreshing attributes.
    pub async fn heartbeat(&self, agent_id: &str, req: HeartbeatRequest) -> DomainResult<Agent> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let mut agent = state
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("agent", agent_id))?;

        if !req.hostname.trim().is_empty() {
            agent.hostname = req.hostname.trim().to_string();
        }
        if !req.version.trim().is_empty() {
            agent.version = req.version.trim().to_string();
        }
        if !req.ip.trim().is_empty() {
            agent.ip = req.ip.trim().to_string();
        }
        if agent.status == AgentStatus::Offline {
            agent.status = AgentStatus::Online;
        }
        agent.heartbeat_count += 1;
        agent.last_seen_at = now;
        agent.updated_at = now;

        self.store.upsert_agent(&agent).await?;
        state.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    /// Remove an agent from assignment consideration.
    pub async fn drain_agent(&self, agent_id: &str) -> DomainResult<Agent> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let mut agent = state
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("agent", agent_id))?;
        agent.status = AgentStatus::Draining;
        agent.updated_at = now;

        self.store.upsert_agent(&agent).await?;
        state.agents.insert(agent.id.clone(), agent.clone());

        self.recorder
            .audit(
                DEFAULT_CREATED_BY,
                "agent_drain",
                "agent",
                &agent.id,
                HashMap::new(),
                now,
            )
            .await;
        Ok(agent)
    }

    pub async fn get_agent(&self, agent_id: &str) -> DomainResult<Agent> {
        let state = self.state.read().await;
        state
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("agent", agent_id))
    }

    /// List agents, most recently seen first.
    pub async fn list_agents(&self, filter: AgentFilter) -> Vec<Agent> {
        let state = self.state.read().await;
        let mut agents: Vec<Agent> = state
            .agents
            .values()
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| filter.group.as_ref().is_none_or(|g| &a.group_name == g))
            .cloned()
            .collect();
        agents.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at).then(a.id.cmp(&b.id)));
        agents
    }

    // ----- task operations --------------------------------------------------

    /// Create a new pending task.
    pub async fn create_task(&self, req: CreateTaskRequest) -> DomainResult<Task> {
        let task_type = req.task_type.trim().to_string();
        let target = req.target.trim().to_string();
        if task_type.is_empty() {
            return Err(DomainError::invalid("type is required"));
        }
        if target.is_empty() {
            return Err(DomainError::invalid("target is required"));
        }

        let now = self.clock.now();
        let mut state = self.state.write().await;

        state.task_seq += 1;
        let task = Task {
            id: format_id(TASK_PREFIX, state.task_seq),
            task_type,
            target,
            payload: req.payload.clone(),
            priority: {
                let p = req.priority.trim();
                if p.is_empty() { "normal" } else { p }.to_string()
            },
            status: TaskStatus::Pending,
            assigned_agent_id: String::new(),
            retry_count: 0,
            max_retries: if req.max_retries <= 0 {
                DEFAULT_MAX_RETRIES
            } else {
                req.max_retries as u32
            },
            created_by: {
                let by = req.created_by.trim();
                if by.is_empty() { DEFAULT_CREATED_BY } else { by }.to_string()
            },
            failure_reason: String::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        };

        self.store.upsert_task(&task).await?;
        state.tasks.insert(task.id.clone(), task.clone());

        self.recorder
            .audit(
                &task.created_by,
                "task_create",
                "task",
                &task.id,
                HashMap::from([
                    ("type".to_string(), json!(task.task_type)),
                    ("target".to_string(), json!(task.target)),
                ]),
                now,
            )
            .await;
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> DomainResult<Task> {
        let state = self.state.read().await;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_id))
    }

    /// List tasks, newest first. Limit defaults to 200, capped at 1000.
    pub async fn list_tasks(&self, filter: TaskFilter) -> Vec<Task> {
        let limit = if filter.limit == 0 {
            DEFAULT_TASK_LIST_LIMIT
        } else {
            filter.limit.min(MAX_TASK_LIST_LIMIT)
        };

        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.task_type.as_ref().is_none_or(|ty| &t.task_type == ty))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tasks.truncate(limit as usize);
        tasks
    }

    /// Cancel a non-terminal task.
    pub async fn cancel_task(&self, task_id: &str, operator: &str) -> DomainResult<Task> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        if task.is_terminal() {
            return Err(DomainError::conflict(format!(
                "task {} is already {}",
                task.id,
                task.status.as_str()
            )));
        }

        let mut next = task;
        next.status = TaskStatus::Canceled;
        next.assigned_agent_id.clear();
        next.finished_at = Some(now);
        next.updated_at = now;

        self.store.upsert_task(&next).await?;
        state.tasks.insert(next.id.clone(), next.clone());

        self.recorder
            .audit(operator, "task_cancel", "task", &next.id, HashMap::new(), now)
            .await;
        Ok(next)
    }

    /// Re-queue a terminal failure while retry budget remains.
    pub async fn retry_task(&self, task_id: &str, operator: &str) -> DomainResult<Task> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        if !matches!(
            task.status,
            TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Canceled
        ) {
            return Err(DomainError::conflict(format!(
                "task {} is {} and cannot be retried",
                task.id,
                task.status.as_str()
            )));
        }
        if task.retry_count >= task.max_retries {
            return Err(DomainError::conflict(format!(
                "task {} has exhausted its retry budget ({}/{})",
                task.id, task.retry_count, task.max_retries
            )));
        }

        let mut next = task;
        next.apply_retry(now);

        self.store.upsert_task(&next).await?;
        state.tasks.insert(next.id.clone(), next.clone());

        self.recorder
            .audit(
                operator,
                "task_retry",
                "task",
                &next.id,
                HashMap::from([("retryCount".to_string(), json!(next.retry_count))]),
                now,
            )
            .await;
        Ok(next)
    }

    // ----- assignment -------------------------------------------------------

    /// Hand up to `maxTasks` pending tasks to a pulling agent.
    ///
    /// The pull doubles as a heartbeat and runs timeout reclamation
    /// before each selection round. Candidates are ordered by priority
    /// weight, then age, then id.
    pub async fn pull(&self, req: PullRequest) -> DomainResult<Vec<Task>> {
        let now = self.clock.now();
        let max_tasks = req.max_tasks.clamp(1, MAX_PULL_TASKS);

        let mut state = self.state.write().await;

        let mut agent = state
            .agents
            .get(&req.agent_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("agent", &req.agent_id))?;
        if agent.status == AgentStatus::Draining {
            return Err(DomainError::conflict(format!(
                "agent {} is draining and cannot pull",
                agent.id
            )));
        }

        if agent.status == AgentStatus::Offline {
            agent.status = AgentStatus::Online;
        }
        agent.heartbeat_count += 1;
        agent.last_seen_at = now;
        agent.updated_at = now;
        self.store.upsert_agent(&agent).await?;
        state.agents.insert(agent.id.clone(), agent.clone());

        let accept: HashSet<&str> = req
            .accept_types
            .iter()
            .map(String::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut assigned = Vec::new();
        for _ in 0..max_tasks {
            self.reclaim_locked(&mut state, now).await?;

            let next_id: Option<String> = {
                let mut candidates: Vec<&Task> = state
                    .tasks
                    .values()
                    .filter(|t| t.status == TaskStatus::Pending)
                    .filter(|t| accept.is_empty() || accept.contains(t.task_type.as_str()))
                    .collect();
                candidates.sort_by(|a, b| {
                    priority_weight(&b.priority)
                        .cmp(&priority_weight(&a.priority))
                        .then(a.created_at.cmp(&b.created_at))
                        .then(a.id.cmp(&b.id))
                });
                candidates.first().map(|t| t.id.clone())
            };
            let Some(task_id) = next_id else { break };
            let Some(mut task) = state.tasks.get(&task_id).cloned() else {
                break;
            };

            task.status = TaskStatus::Assigned;
            task.assigned_agent_id = agent.id.clone();
            task.updated_at = now;

            self.store.upsert_task(&task).await?;
            state.tasks.insert(task.id.clone(), task.clone());

            self.recorder
                .task_event(
                    &task.id,
                    &agent.id,
                    TaskEventKind::Assigned,
                    format!("assigned to {}", agent.id),
                    now,
                )
                .await;
            self.recorder
                .audit(
                    &agent.id,
                    "task_assigned",
                    "task",
                    &task.id,
                    HashMap::from([("agentId".to_string(), json!(agent.id))]),
                    now,
                )
                .await;
            assigned.push(task);
        }
        Ok(assigned)
    }

    /// Agent acknowledgment: assigned → running.
    pub async fn ack(&self, task_id: &str, req: AckRequest) -> DomainResult<Task> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        if task.status != TaskStatus::Assigned || task.assigned_agent_id != req.agent_id {
            return Err(DomainError::conflict(format!(
                "task {} is not assigned to agent {}",
                task.id, req.agent_id
            )));
        }

        let mut next = task;
        next.status = TaskStatus::Running;
        next.updated_at = now;

        self.store.upsert_task(&next).await?;
        state.tasks.insert(next.id.clone(), next.clone());

        self.recorder
            .task_event(&next.id, &req.agent_id, TaskEventKind::Started, req.message, now)
            .await;
        Ok(next)
    }

    /// Progress report from the owning agent; refreshes the run deadline.
    pub async fn progress(&self, task_id: &str, req: ProgressRequest) -> DomainResult<Task> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        if task.status != TaskStatus::Running || task.assigned_agent_id != req.agent_id {
            return Err(DomainError::conflict(format!(
                "task {} is not running on agent {}",
                task.id, req.agent_id
            )));
        }

        let mut next = task;
        next.updated_at = now;

        self.store.upsert_task(&next).await?;
        state.tasks.insert(next.id.clone(), next.clone());

        let message = if req.message.is_empty() && req.progress > 0 {
            format!("progress={}", req.progress)
        } else {
            req.message
        };
        self.recorder
            .task_event(&next.id, &req.agent_id, TaskEventKind::Progress, message, now)
            .await;
        Ok(next)
    }

    /// Terminal completion reported by the owning agent.
    pub async fn complete(&self, task_id: &str, req: CompleteRequest) -> DomainResult<Task> {
        let status = match req.status.as_str() {
            "success" => TaskStatus::Success,
            "failed" => TaskStatus::Failed,
            other => {
                return Err(DomainError::invalid(format!(
                    "status must be success or failed, got {other:?}"
                )))
            }
        };

        let now = self.clock.now();
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        if task.is_terminal() {
            return Err(DomainError::conflict(format!(
                "task {} is already {}",
                task.id,
                task.status.as_str()
            )));
        }
        if !matches!(task.status, TaskStatus::Assigned | TaskStatus::Running) {
            return Err(DomainError::conflict(format!(
                "task {} is {} and cannot be completed",
                task.id,
                task.status.as_str()
            )));
        }
        if task.assigned_agent_id != req.agent_id {
            return Err(DomainError::conflict(format!(
                "task {} is owned by {}, not {}",
                task.id, task.assigned_agent_id, req.agent_id
            )));
        }

        let mut next = task;
        next.status = status;
        next.finished_at = Some(now);
        next.updated_at = now;
        next.assigned_agent_id.clear();
        if status == TaskStatus::Failed {
            next.failure_reason = derive_failure_reason(&req.error, &req.message);
        }

        self.store.upsert_task(&next).await?;
        state.tasks.insert(next.id.clone(), next.clone());

        let (kind, message) = if status == TaskStatus::Success {
            (TaskEventKind::Succeeded, req.message.clone())
        } else {
            (TaskEventKind::Failed, next.failure_reason.clone())
        };
        self.recorder
            .task_event(&next.id, &req.agent_id, kind, message, now)
            .await;
        self.recorder
            .audit(
                &req.agent_id,
                "task_complete",
                "task",
                &next.id,
                HashMap::from([
                    ("status".to_string(), json!(status.as_str())),
                    ("error".to_string(), json!(req.error)),
                ]),
                now,
            )
            .await;
        Ok(next)
    }

    // ----- reporting --------------------------------------------------------

    /// Aggregate terminal failures by reason.
    pub async fn failure_reasons(&self, filter: FailureReasonFilter) -> FailureReasonReport {
        let state = self.state.read().await;
        aggregate(state.tasks.values(), &filter)
    }

    /// Event log for one task, newest first.
    pub async fn task_events(&self, task_id: &str, limit: u32) -> DomainResult<Vec<TaskEvent>> {
        {
            let state = self.state.read().await;
            if !state.tasks.contains_key(task_id) {
                return Err(DomainError::not_found("task", task_id));
            }
        }
        self.store.list_task_events(task_id, limit).await
    }

    /// Audit log query.
    pub async fn audit_logs(
        &self,
        query: AuditQuery,
    ) -> DomainResult<Vec<crate::domain::models::AuditEntry>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(DomainError::invalid("audit range: from is after to"));
            }
        }
        self.store.list_audit_logs(&query).await
    }

    // ----- reclamation ------------------------------------------------------

    /// Mark agents offline once they fall past the `offline_after`
    /// threshold, then revert expired assignments and reap over-deadline
    /// runs.
    ///
    /// A stale agent is flipped to offline rather than deleted; the next
    /// heartbeat or pull revives it. Assignment expiry never burns retry
    /// budget (the agent never acknowledged); run expiry retries while
    /// budget remains and otherwise finalizes the task as `timeout`.
    async fn reclaim_locked(
        &self,
        state: &mut CoreState,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<()> {
        let stale: Vec<String> = state
            .agents
            .values()
            .filter(|a| {
                a.status == AgentStatus::Online
                    && !a.active_for_selection(now, self.tuning.offline_after)
            })
            .map(|a| a.id.clone())
            .collect();
        for agent_id in stale {
            let Some(mut agent) = state.agents.get(&agent_id).cloned() else {
                continue;
            };
            agent.status = AgentStatus::Offline;
            agent.updated_at = now;

            self.store.upsert_agent(&agent).await?;
            state.agents.insert(agent_id, agent);
        }

        let expired: Vec<String> = state
            .tasks
            .values()
            .filter(|t| match t.status {
                TaskStatus::Assigned => {
                    now.signed_duration_since(t.updated_at) > self.tuning.assign_timeout
                }
                TaskStatus::Running => {
                    now.signed_duration_since(t.updated_at) > self.tuning.run_timeout
                }
                _ => false,
            })
            .map(|t| t.id.clone())
            .collect();

        for task_id in expired {
            let Some(task) = state.tasks.get(&task_id).cloned() else {
                continue;
            };
            let prev_agent = task.assigned_agent_id.clone();

            match task.status {
                TaskStatus::Assigned => {
                    let mut next = task;
                    next.status = TaskStatus::Pending;
                    next.assigned_agent_id.clear();
                    next.updated_at = now;

                    self.store.upsert_task(&next).await?;
                    state.tasks.insert(task_id.clone(), next);

                    self.recorder
                        .task_event(
                            &task_id,
                            &prev_agent,
                            TaskEventKind::AssignTimeout,
                            "assignment expired before ack",
                            now,
                        )
                        .await;
                }
                TaskStatus::Running if task.retry_count < task.max_retries => {
                    let mut next = task;
                    next.apply_retry(now);

                    self.store.upsert_task(&next).await?;
                    let budget = format!("{}/{}", next.retry_count, next.max_retries);
                    state.tasks.insert(task_id.clone(), next);

                    self.recorder
                        .task_event(
                            &task_id,
                            &prev_agent,
                            TaskEventKind::Timeout,
                            format!("run timeout, requeued ({budget})"),
                            now,
                        )
                        .await;
                }
                TaskStatus::Running => {
                    let mut next = task;
                    next.status = TaskStatus::Timeout;
                    next.assigned_agent_id.clear();
                    next.finished_at = Some(now);
                    next.updated_at = now;

                    self.store.upsert_task(&next).await?;
                    state.tasks.insert(task_id.clone(), next);

                    self.recorder
                        .task_event(
                            &task_id,
                            &prev_agent,
                            TaskEventKind::Timeout,
                            "run timeout, retry budget exhausted",
                            now,
                        )
                        .await;
                    self.recorder
                        .audit(
                            SYSTEM_OPERATOR,
                            "task_timeout",
                            "task",
                            &task_id,
                            HashMap::from([("agentId".to_string(), json!(prev_agent))]),
                            now,
                        )
                        .await;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Reason recorded for a failed completion, in order of preference:
/// the explicit error field, an `error=`-prefixed message, the raw
/// message, then the generic label.
fn derive_failure_reason(error: &str, message: &str) -> String {
    let error = error.trim();
    if !error.is_empty() {
        return error.to_string();
    }
    let message = message.trim();
    if let Some(suffix) = message.strip_prefix("error=") {
        let suffix = suffix.trim();
        if !suffix.is_empty() {
            return suffix.to_string();
        }
    }
    if !message.is_empty() {
        return message.to_string();
    }
    "task_failed".to_string()
}
