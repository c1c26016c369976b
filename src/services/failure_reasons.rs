//! Failure-reason aggregation.
//!
//! Groups terminal-failure tasks by reason so operators can see what is
//! actually breaking, without paging through the task list.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskStatus};

/// Default number of buckets returned.
const DEFAULT_LIMIT: u32 = 10;
/// Hard cap on returned buckets.
const MAX_LIMIT: u32 = 100;
/// Sample task ids retained per bucket.
const MAX_SAMPLES: usize = 3;

/// Filter for the aggregation. `statuses = None` means failed + timeout.
#[derive(Debug, Clone, Default)]
pub struct FailureReasonFilter {
    pub statuses: Option<Vec<TaskStatus>>,
    pub task_type: Option<String>,
    pub limit: u32,
}

/// One reason bucket.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReasonBucket {
    pub reason: String,
    pub count: u64,
    /// Per-status breakdown, keyed by status label.
    pub statuses: HashMap<String, u64>,
    /// Up to three representative task ids.
    pub sample_task_ids: Vec<String>,
}

/// Aggregation result: top-N buckets plus the total bucket count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReasonReport {
    pub items: Vec<ReasonBucket>,
    pub total: u64,
}

/// Parse a comma-separated status filter. Only terminal failure states
/// are accepted; anything else is invalid input.
pub fn parse_status_filter(raw: &str) -> DomainResult<Option<Vec<TaskStatus>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let mut statuses = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let status = TaskStatus::parse_str(part)
            .ok_or_else(|| DomainError::invalid(format!("unknown status {part:?}")))?;
        if !matches!(
            status,
            TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Canceled
        ) {
            return Err(DomainError::invalid(format!(
                "status {part:?} is not a terminal failure state"
            )));
        }
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    if statuses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(statuses))
    }
}

/// Reason used when a task carries no explicit failure reason.
fn default_reason(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Timeout => "run_timeout",
        TaskStatus::Canceled => "manual_cancel",
        _ => "task_failed",
    }
}

/// Aggregate matching tasks into reason buckets.
///
/// Buckets are keyed by the lowercased reason; output is sorted by count
/// descending, then reason ascending. Sample ids follow task-id order.
pub fn aggregate<'a, I>(tasks: I, filter: &FailureReasonFilter) -> FailureReasonReport
where
    I: Iterator<Item = &'a Task>,
{
    let statuses = filter
        .statuses
        .clone()
        .unwrap_or_else(|| vec![TaskStatus::Failed, TaskStatus::Timeout]);
    let limit = if filter.limit == 0 {
        DEFAULT_LIMIT
    } else {
        filter.limit.min(MAX_LIMIT)
    };

    let mut matching: Vec<&Task> = tasks
        .filter(|t| statuses.contains(&t.status))
        .filter(|t| {
            filter
                .task_type
                .as_ref()
                .is_none_or(|ty| &t.task_type == ty)
        })
        .collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));

    let mut buckets: HashMap<String, ReasonBucket> = HashMap::new();
    for task in matching {
        let reason = if task.failure_reason.is_empty() {
            default_reason(task.status).to_string()
        } else {
            task.failure_reason.clone()
        };
        let key = reason.to_lowercase();

        let bucket = buckets.entry(key.clone()).or_insert_with(|| ReasonBucket {
            reason: key,
            count: 0,
            statuses: HashMap::new(),
            sample_task_ids: Vec::new(),
        });
        bucket.count += 1;
        *bucket
            .statuses
            .entry(task.status.as_str().to_string())
            .or_insert(0) += 1;
        if bucket.sample_task_ids.len() < MAX_SAMPLES {
            bucket.sample_task_ids.push(task.id.clone());
        }
    }

    let total = buckets.len() as u64;
    let mut items: Vec<ReasonBucket> = buckets.into_values().collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
    items.truncate(limit as usize);

    FailureReasonReport { items, total }
}
