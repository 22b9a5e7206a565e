//! API response types returned as JSON by `vigil-server` routes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{AuditControl, AuditFinding, AuditRun, AuditRunActivity, Task};

/// Response from `GET /api/admin/audit-runs/{id}`: the run plus its children.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRunDetail {
    #[serde(flatten)]
    pub audit_run: AuditRun,
    pub controls: Vec<AuditControl>,
    pub findings: Vec<AuditFinding>,
    pub tasks: Vec<Task>,
    /// Most recent activity first, capped at one page.
    pub activity: Vec<AuditRunActivity>,
}

/// Response from `POST /api/admin/audit-runs/{id}/controls`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddControlsResponse {
    pub added: Vec<AuditControl>,
    /// Control ids already attached to the run; silently skipped.
    pub skipped_control_ids: Vec<String>,
    pub tasks: Vec<Task>,
}

/// Response from `POST /api/admin/audit-findings`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FindingCreateResponse {
    pub finding: AuditFinding,
    pub remediation_task: Option<Task>,
}

/// One page of activity entries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPage {
    pub entries: Vec<AuditRunActivity>,
    pub limit: u32,
    pub offset: u32,
}
