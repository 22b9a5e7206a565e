use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::AuditControlStatus;

/// A control attached to an audit run. Unique per `(audit_run_id, control_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditControl {
    pub id: String,
    pub audit_run_id: String,
    pub control_id: String,
    pub reviewer_id: Option<String>,
    pub approver_id: Option<String>,
    pub status: AuditControlStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
