//! Request bodies and query strings accepted by the HTTP API.
//!
//! Every request names its organization through `organizationId`. A missing
//! value deserializes to an empty string so the service answers with its own
//! validation message instead of a generic parse error.
//!
//! Nullable fields on update bodies use `Option<Option<T>>`: absent leaves the
//! column alone, `null` clears it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use vigil_core::enums::{
    ActivityType, AuditControlStatus, AuditRunStatus, FindingSeverity, FindingStatus,
    TaskPriority, TaskStatus, TaskType,
};
use vigil_db::queries::{ActivityQuery, AuditRunQuery, FindingQuery, TaskQuery};
use vigil_db::repos::audit_control::AddControls;
use vigil_db::repos::audit_run::NewAuditRun;
use vigil_db::repos::catalog::NewControl;
use vigil_db::repos::finding::NewFinding;
use vigil_db::updates::audit_control::AuditControlUpdate;
use vigil_db::updates::audit_run::AuditRunUpdate;
use vigil_db::updates::finding::FindingUpdate;
use vigil_db::updates::task::TaskUpdate;

#[allow(clippy::option_option)]
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// `?organizationId=` on reads and deletes, or `{organizationId}` on lock.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgScope {
    #[serde(default)]
    pub organization_id: String,
}

// ---------------------------------------------------------------------------
// Audit runs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRunListParams {
    #[serde(default)]
    pub organization_id: String,
    pub status: Option<AuditRunStatus>,
    pub framework_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditRunListParams {
    pub fn split(self) -> (String, AuditRunQuery) {
        let query = AuditRunQuery {
            status: self.status,
            framework_id: self.framework_id,
            limit: self.limit,
            offset: self.offset,
        };
        (self.organization_id, query)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditRunBody {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub framework_id: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<AuditRunStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<CreateAuditRunBody> for NewAuditRun {
    fn from(body: CreateAuditRunBody) -> Self {
        Self {
            organization_id: body.organization_id,
            framework_id: body.framework_id,
            name: body.name,
            description: body.description,
            status: body.status,
            start_date: body.start_date,
            end_date: body.end_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct UpdateAuditRunBody {
    #[serde(default)]
    pub organization_id: String,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<AuditRunStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateAuditRunBody {
    pub fn split(self) -> (String, AuditRunUpdate) {
        let update = AuditRunUpdate {
            name: self.name,
            description: self.description,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
        };
        (self.organization_id, update)
    }
}

// ---------------------------------------------------------------------------
// Audit controls
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddControlsBody {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub control_ids: Vec<String>,
    /// `controlId -> userId`
    #[serde(default)]
    pub reviewer_assignments: HashMap<String, String>,
    #[serde(default)]
    pub approver_assignments: HashMap<String, String>,
}

impl AddControlsBody {
    pub fn split(self) -> (String, AddControls) {
        let request = AddControls {
            control_ids: self.control_ids,
            reviewer_assignments: self.reviewer_assignments,
            approver_assignments: self.approver_assignments,
        };
        (self.organization_id, request)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct UpdateAuditControlBody {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default, deserialize_with = "double_option")]
    pub reviewer_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub approver_id: Option<Option<String>>,
    pub status: Option<AuditControlStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateAuditControlBody {
    pub fn split(self) -> (String, AuditControlUpdate) {
        let update = AuditControlUpdate {
            reviewer_id: self.reviewer_id,
            approver_id: self.approver_id,
            status: self.status,
            notes: self.notes,
        };
        (self.organization_id, update)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParams {
    #[serde(default)]
    pub organization_id: String,
    pub activity_type: Option<ActivityType>,
    pub performed_by: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ActivityParams {
    pub fn split(self) -> (String, ActivityQuery) {
        let query = ActivityQuery {
            activity_type: self.activity_type,
            performed_by: self.performed_by,
            limit: self.limit,
            offset: self.offset,
        };
        (self.organization_id, query)
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingListParams {
    #[serde(default)]
    pub organization_id: String,
    pub audit_run_id: Option<String>,
    pub severity: Option<FindingSeverity>,
    pub status: Option<FindingStatus>,
    pub owner_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl FindingListParams {
    pub fn split(self) -> (String, FindingQuery) {
        let query = FindingQuery {
            audit_run_id: self.audit_run_id,
            severity: self.severity,
            status: self.status,
            owner_id: self.owner_id,
            limit: self.limit,
            offset: self.offset,
        };
        (self.organization_id, query)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFindingBody {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub audit_run_id: String,
    pub severity: FindingSeverity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub control_id: Option<String>,
    pub audit_control_id: Option<String>,
    pub owner_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub remediation_plan: Option<String>,
}

impl From<CreateFindingBody> for NewFinding {
    fn from(body: CreateFindingBody) -> Self {
        Self {
            organization_id: body.organization_id,
            audit_run_id: body.audit_run_id,
            severity: body.severity,
            title: body.title,
            description: body.description,
            control_id: body.control_id,
            audit_control_id: body.audit_control_id,
            owner_id: body.owner_id,
            due_date: body.due_date,
            remediation_plan: body.remediation_plan,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct UpdateFindingBody {
    #[serde(default)]
    pub organization_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<FindingSeverity>,
    pub status: Option<FindingStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub owner_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub remediation_plan: Option<Option<String>>,
}

impl UpdateFindingBody {
    pub fn split(self) -> (String, FindingUpdate) {
        let update = FindingUpdate {
            title: self.title,
            description: self.description,
            severity: self.severity,
            status: self.status,
            owner_id: self.owner_id,
            due_date: self.due_date,
            remediation_plan: self.remediation_plan,
        };
        (self.organization_id, update)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListParams {
    #[serde(default)]
    pub organization_id: String,
    pub audit_run_id: Option<String>,
    pub finding_id: Option<String>,
    pub assignee_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TaskListParams {
    pub fn split(self) -> (String, TaskQuery) {
        let query = TaskQuery {
            audit_run_id: self.audit_run_id,
            finding_id: self.finding_id,
            assignee_id: self.assignee_id,
            status: self.status,
            priority: self.priority,
            task_type: self.task_type,
            limit: self.limit,
            offset: self.offset,
        };
        (self.organization_id, query)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct UpdateTaskBody {
    #[serde(default)]
    pub organization_id: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTaskBody {
    pub fn split(self) -> (String, TaskUpdate) {
        let update = TaskUpdate {
            status: self.status,
            priority: self.priority,
            assignee_id: self.assignee_id,
            due_date: self.due_date,
        };
        (self.organization_id, update)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFrameworkBody {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlListParams {
    #[serde(default)]
    pub organization_id: String,
    pub framework_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateControlBody {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub framework_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
}

impl From<CreateControlBody> for NewControl {
    fn from(body: CreateControlBody) -> Self {
        Self {
            organization_id: body.organization_id,
            framework_id: body.framework_id,
            code: body.code,
            title: body.title,
            description: body.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn absent_and_null_are_distinct_on_updates() {
        let body: UpdateFindingBody = serde_json::from_value(json!({
            "organizationId": "org-1",
            "ownerId": null,
        }))
        .unwrap();
        let (org, update) = body.split();
        assert_eq!(org, "org-1");
        assert_eq!(update.owner_id, Some(None));
        assert_eq!(update.due_date, None);
        assert_eq!(update.remediation_plan, None);
    }

    #[test]
    fn assignment_maps_default_to_empty() {
        let body: AddControlsBody = serde_json::from_value(json!({
            "organizationId": "org-1",
            "controlIds": ["ctl-1", "ctl-2"],
        }))
        .unwrap();
        let (_, request) = body.split();
        assert_eq!(request.control_ids.len(), 2);
        assert!(request.reviewer_assignments.is_empty());
        assert!(request.approver_assignments.is_empty());
    }

    #[test]
    fn missing_organization_is_empty_not_an_error() {
        let body: CreateAuditRunBody = serde_json::from_value(json!({
            "frameworkId": "fwk-1",
            "name": "FY26",
        }))
        .unwrap();
        assert_eq!(body.organization_id, "");
    }

    #[test]
    fn enums_parse_from_screaming_snake_case() {
        let body: UpdateTaskBody = serde_json::from_value(json!({
            "organizationId": "org-1",
            "status": "IN_PROGRESS",
            "priority": "HIGH",
        }))
        .unwrap();
        assert_eq!(body.status, Some(TaskStatus::InProgress));
        assert_eq!(body.priority, Some(TaskPriority::High));
    }
}
