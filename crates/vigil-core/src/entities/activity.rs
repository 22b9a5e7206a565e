use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ActivityType, EntityType};

/// An append-only activity entry recording one state change inside an audit run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRunActivity {
    pub id: String,
    pub audit_run_id: String,
    pub activity_type: ActivityType,
    pub performed_by: String,
    pub target_entity_type: EntityType,
    pub target_entity_id: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
