//! Operator-facing audit records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator recorded for automatic transitions such as timeout reclamation.
pub const SYSTEM_OPERATOR: &str = "system";

/// One append-only audit record of an operator or system action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Auto-increment row id; 0 before insertion.
    pub id: i64,
    pub operator: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub detail: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        operator: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        detail: HashMap<String, serde_json::Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            operator: operator.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            detail,
            created_at,
        }
    }
}

/// Filter for audit queries. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub operator: Option<String>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: u32,
}
