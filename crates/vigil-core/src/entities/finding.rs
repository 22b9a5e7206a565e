use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{FindingSeverity, FindingStatus};

/// A recorded deficiency within an audit run, optionally against a control.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    pub id: String,
    pub organization_id: String,
    pub audit_run_id: String,
    pub control_id: Option<String>,
    pub audit_control_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: FindingSeverity,
    pub status: FindingStatus,
    pub owner_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub remediation_plan: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
