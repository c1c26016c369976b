//! Sequence-based entity ids.
//!
//! Ids are `{prefix}-{seq:06}` with a per-prefix monotonic counter. On
//! startup the dispatcher scans restored ids and resumes each counter at
//! `max(seq) + 1`, keeping ids monotonic across restarts.

/// Prefix for agent ids (`agt-000001`).
pub const AGENT_PREFIX: &str = "agt";

/// Prefix for task ids (`tsk-000001`).
pub const TASK_PREFIX: &str = "tsk";

/// Format a sequence number as an entity id.
pub fn format_id(prefix: &str, seq: u64) -> String {
    format!("{prefix}-{seq:06}")
}

/// Extract the numeric suffix of an id if it carries the given prefix.
///
/// Returns `None` for foreign prefixes or malformed suffixes, so corrupt
/// rows never poison sequence recovery.
pub fn parse_seq(prefix: &str, id: &str) -> Option<u64> {
    let rest = id.strip_prefix(prefix)?.strip_prefix('-')?;
    if rest.is_empty() {
        return None;
    }
    rest.parse().ok()
}
