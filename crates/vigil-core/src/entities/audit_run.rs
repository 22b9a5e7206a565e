use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::AuditRunStatus;

/// A bounded audit engagement scoping a set of controls and findings.
///
/// Once `status` is `Locked` the run and all of its children are read-only.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRun {
    pub id: String,
    pub organization_id: String,
    pub framework_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: AuditRunStatus,
    pub creator_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
