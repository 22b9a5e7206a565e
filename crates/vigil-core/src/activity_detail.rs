//! Typed activity detail payloads.
//!
//! Most activity entries carry full entity snapshots in `oldValue`/`newValue`.
//! Batch operations carry a summary instead; these types give that summary a
//! schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `newValue` for `ActivityType::ControlsAdded`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControlsAddedDetail {
    pub audit_control_ids: Vec<String>,
    pub control_ids: Vec<String>,
    pub count: u32,
}
