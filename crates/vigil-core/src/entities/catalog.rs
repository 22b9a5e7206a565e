use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A compliance framework (e.g. SOC 2, ISO 27001) owning a set of controls.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Framework {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A compliance requirement tracked per framework.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub id: String,
    pub organization_id: String,
    pub framework_id: String,
    /// Framework-local reference, e.g. `CC6.1`. Unique per framework.
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
