//! Controls attached to an audit run.
//!
//! Attaching is an idempotent bulk insert: the `(audit_run_id, control_id)`
//! unique constraint silently skips pairs that already exist. Every newly
//! attached control gets one evidence-collection task.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use vigil_auth::{Resource, Verb};
use vigil_core::activity_detail::ControlsAddedDetail;
use vigil_core::entities::{AuditControl, AuditRunActivity};
use vigil_core::enums::{ActivityType, AuditControlStatus, EntityType, TaskPriority, TaskType};
use vigil_core::identity::AuthIdentity;
use vigil_core::ids::PREFIX_AUDIT_CONTROL;
use vigil_core::responses::AddControlsResponse;

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::RowExt;
use crate::repos::activity::NewActivity;
use crate::repos::task::NewTask;
use crate::service::VigilService;
use crate::updates::SetClauses;
use crate::updates::audit_control::AuditControlUpdate;

const SELECT_COLS: &str = "id, audit_run_id, control_id, reviewer_id, approver_id, status, \
                           notes, created_at, updated_at";

fn row_to_audit_control(row: &libsql::Row) -> Result<AuditControl, DatabaseError> {
    Ok(AuditControl {
        id: row.get(0)?,
        audit_run_id: row.get(1)?,
        control_id: row.get(2)?,
        reviewer_id: row.opt_text(3)?,
        approver_id: row.opt_text(4)?,
        status: row.enum_value(5)?,
        notes: row.opt_text(6)?,
        created_at: row.timestamp(7)?,
        updated_at: row.timestamp(8)?,
    })
}

/// Input for [`VigilService::add_controls`]. Assignment maps are keyed by
/// control id and map to a user id.
#[derive(Debug, Clone, Default)]
pub struct AddControls {
    pub control_ids: Vec<String>,
    pub reviewer_assignments: HashMap<String, String>,
    pub approver_assignments: HashMap<String, String>,
}

impl AddControls {
    /// Control ids in request order with duplicates and blanks removed.
    fn unique_control_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.control_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .collect()
    }

    fn has_assignments(&self) -> bool {
        !self.reviewer_assignments.is_empty() || !self.approver_assignments.is_empty()
    }
}

/// Re-key an assignment map by trimmed control id and trimmed user id.
///
/// Every key must name a control in the batch, and no two keys may trim to
/// the same control.
fn trimmed_assignments<'a>(
    field: &str,
    assignments: &'a HashMap<String, String>,
    control_ids: &[&str],
) -> Result<HashMap<&'a str, &'a str>, ServiceError> {
    let mut trimmed = HashMap::with_capacity(assignments.len());
    for (control_id, user_id) in assignments {
        let control_id = control_id.trim();
        if !control_ids.contains(&control_id) {
            return Err(ServiceError::validation(format!(
                "{field} assignment for control {control_id} which is not in controlIds"
            )));
        }
        if trimmed.insert(control_id, user_id.trim()).is_some() {
            return Err(ServiceError::validation(format!(
                "duplicate {field} assignment for control {control_id}"
            )));
        }
    }
    Ok(trimmed)
}

impl VigilService {
    /// Attach controls to an unlocked run.
    ///
    /// Creates one `EVIDENCE_COLLECTION` task per newly attached control,
    /// assigned to its reviewer when one is given, and one `CONTROLS_ADDED`
    /// activity. A batch where every pair already exists records nothing.
    pub async fn add_controls(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        request: AddControls,
    ) -> Result<AddControlsResponse, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditControl, Verb::Create)
            .await?;
        if request.has_assignments() {
            self.require_permission(identity, org_id, Resource::AuditControl, Verb::Assign)
                .await?;
        }
        if request.unique_control_ids().is_empty() {
            return Err(ServiceError::validation("controlIds must not be empty"));
        }

        let guard = self.db().begin_write().await?;
        let result = self
            .attach_controls(identity, org_id, audit_run_id, &request)
            .await;
        let (response, activity) = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(
            audit_run_id,
            added = response.added.len(),
            skipped = response.skipped_control_ids.len(),
            "controls attached"
        );
        if let Some(activity) = activity {
            self.publish(&[activity]);
        }
        Ok(response)
    }

    async fn attach_controls(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        request: &AddControls,
    ) -> Result<(AddControlsResponse, Option<AuditRunActivity>), ServiceError> {
        let run = self.fetch_unlocked_run(org_id, audit_run_id).await?;
        let control_ids = request.unique_control_ids();

        let reviewers =
            trimmed_assignments("reviewer", &request.reviewer_assignments, &control_ids)?;
        let approvers =
            trimmed_assignments("approver", &request.approver_assignments, &control_ids)?;
        for (field, assignments) in [("reviewer", &reviewers), ("approver", &approvers)] {
            for user_id in assignments.values() {
                self.ensure_member(org_id, user_id, field).await?;
            }
        }

        let mut controls = Vec::with_capacity(control_ids.len());
        for control_id in &control_ids {
            controls.push(self.fetch_control(org_id, control_id).await?);
        }

        let now = Utc::now();
        let mut added = Vec::new();
        let mut skipped_control_ids = Vec::new();
        let mut tasks = Vec::new();

        for control in &controls {
            let reviewer_id = reviewers.get(control.id.as_str()).copied();
            let approver_id = approvers.get(control.id.as_str()).copied();
            let id = self.db().generate_id(PREFIX_AUDIT_CONTROL).await?;

            let inserted = self
                .db()
                .conn()
                .execute(
                    &format!(
                        "INSERT OR IGNORE INTO audit_controls ({SELECT_COLS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)"
                    ),
                    libsql::params![
                        id.as_str(),
                        run.id.as_str(),
                        control.id.as_str(),
                        reviewer_id,
                        approver_id,
                        AuditControlStatus::NotStarted.as_str(),
                        now.to_rfc3339(),
                        now.to_rfc3339()
                    ],
                )
                .await?;
            if inserted == 0 {
                skipped_control_ids.push(control.id.clone());
                continue;
            }

            let audit_control = AuditControl {
                id,
                audit_run_id: run.id.clone(),
                control_id: control.id.clone(),
                reviewer_id: reviewer_id.map(String::from),
                approver_id: approver_id.map(String::from),
                status: AuditControlStatus::NotStarted,
                notes: None,
                created_at: now,
                updated_at: now,
            };

            let task = self
                .insert_task(NewTask {
                    organization_id: org_id,
                    audit_run_id: Some(&run.id),
                    audit_control_id: Some(&audit_control.id),
                    finding_id: None,
                    title: format!("Collect evidence: {} {}", control.code, control.title),
                    description: control.description.clone(),
                    task_type: TaskType::EvidenceCollection,
                    priority: TaskPriority::Medium,
                    assignee_id: reviewer_id,
                    due_date: run.end_date,
                    created_by: &identity.user_id,
                })
                .await?;

            added.push(audit_control);
            tasks.push(task);
        }

        let activity = if added.is_empty() {
            None
        } else {
            let detail = ControlsAddedDetail {
                audit_control_ids: added.iter().map(|ac| ac.id.clone()).collect(),
                control_ids: added.iter().map(|ac| ac.control_id.clone()).collect(),
                count: u32::try_from(added.len()).unwrap_or(u32::MAX),
            };
            Some(
                self.record_activity(NewActivity {
                    organization_id: org_id,
                    audit_run_id: &run.id,
                    activity_type: ActivityType::ControlsAdded,
                    performed_by: &identity.user_id,
                    target_entity_type: EntityType::AuditRun,
                    target_entity_id: &run.id,
                    old_value: None,
                    new_value: Some(serde_json::to_value(&detail)?),
                })
                .await?,
            )
        };

        Ok((
            AddControlsResponse {
                added,
                skipped_control_ids,
                tasks,
            },
            activity,
        ))
    }

    pub async fn list_audit_controls(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
    ) -> Result<Vec<AuditControl>, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditControl, Verb::Read)
            .await?;
        let _read = self.db().read().await;
        let run = self.fetch_audit_run(org_id, audit_run_id).await?;
        Ok(self.controls_for_run(&run.id).await?)
    }

    /// Change reviewer, approver, status, or notes of one attached control.
    pub async fn update_audit_control(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        audit_control_id: &str,
        update: AuditControlUpdate,
    ) -> Result<AuditControl, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditControl, Verb::Update)
            .await?;
        if update.changes_assignment() {
            self.require_permission(identity, org_id, Resource::AuditControl, Verb::Assign)
                .await?;
        }

        let guard = self.db().begin_write().await?;
        let result = self
            .apply_audit_control_update(identity, org_id, audit_run_id, audit_control_id, &update)
            .await;
        let (audit_control, activity) = self.db().finish_write(result).await?;
        drop(guard);

        if let Some(activity) = activity {
            tracing::info!(audit_control_id, "audit control updated");
            self.publish(&[activity]);
        }
        Ok(audit_control)
    }

    async fn apply_audit_control_update(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        audit_control_id: &str,
        update: &AuditControlUpdate,
    ) -> Result<(AuditControl, Option<AuditRunActivity>), ServiceError> {
        let run = self.fetch_unlocked_run(org_id, audit_run_id).await?;
        let before = self.fetch_audit_control(&run.id, audit_control_id).await?;
        if update.is_empty() {
            return Ok((before, None));
        }

        let mut sets = SetClauses::new();
        if let Some(reviewer_id) = &update.reviewer_id {
            if let Some(user_id) = reviewer_id {
                self.ensure_member(org_id, user_id, "reviewer").await?;
            }
            sets.set_nullable("reviewer_id", reviewer_id.clone());
        }
        if let Some(approver_id) = &update.approver_id {
            if let Some(user_id) = approver_id {
                self.ensure_member(org_id, user_id, "approver").await?;
            }
            sets.set_nullable("approver_id", approver_id.clone());
        }
        if let Some(status) = update.status {
            sets.set("status", status.as_str());
        }
        if let Some(notes) = &update.notes {
            sets.set_nullable("notes", notes.clone());
        }
        let (sql, params) =
            sets.into_statement("audit_controls", &Utc::now().to_rfc3339(), audit_control_id);
        self.db()
            .conn()
            .execute(&sql, libsql::params_from_iter(params))
            .await?;

        let after = self.fetch_audit_control(&run.id, audit_control_id).await?;
        let activity = self
            .record_activity(NewActivity {
                organization_id: org_id,
                audit_run_id: &run.id,
                activity_type: ActivityType::ControlUpdated,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::AuditControl,
                target_entity_id: audit_control_id,
                old_value: Some(serde_json::to_value(&before)?),
                new_value: Some(serde_json::to_value(&after)?),
            })
            .await?;

        Ok((after, Some(activity)))
    }

    /// Detach a control from an unlocked run.
    ///
    /// Its evidence tasks go with it. Findings and their remediation tasks
    /// stay and lose the link to the control.
    pub async fn remove_audit_control(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        audit_control_id: &str,
    ) -> Result<AuditControl, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditControl, Verb::Delete)
            .await?;

        let guard = self.db().begin_write().await?;
        let result = self
            .detach_control(identity, org_id, audit_run_id, audit_control_id)
            .await;
        let (removed, activity) = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(audit_control_id, audit_run_id, "audit control removed");
        self.publish(&[activity]);
        Ok(removed)
    }

    async fn detach_control(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        audit_control_id: &str,
    ) -> Result<(AuditControl, AuditRunActivity), ServiceError> {
        let run = self.fetch_unlocked_run(org_id, audit_run_id).await?;
        let removed = self.fetch_audit_control(&run.id, audit_control_id).await?;

        let evidence_tasks = self
            .db()
            .conn()
            .execute(
                "DELETE FROM tasks WHERE audit_control_id = ?1 AND task_type = ?2",
                [audit_control_id, TaskType::EvidenceCollection.as_str()],
            )
            .await?;
        tracing::debug!(audit_control_id, evidence_tasks, "evidence tasks removed");

        self.db()
            .conn()
            .execute(
                "DELETE FROM audit_controls WHERE id = ?1 AND audit_run_id = ?2",
                [audit_control_id, run.id.as_str()],
            )
            .await?;

        let activity = self
            .record_activity(NewActivity {
                organization_id: org_id,
                audit_run_id: &run.id,
                activity_type: ActivityType::ControlRemoved,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::AuditControl,
                target_entity_id: audit_control_id,
                old_value: Some(serde_json::to_value(&removed)?),
                new_value: None,
            })
            .await?;

        Ok((removed, activity))
    }

    /// Audit control `id` inside `audit_run_id`.
    pub(crate) async fn fetch_audit_control(
        &self,
        audit_run_id: &str,
        id: &str,
    ) -> Result<AuditControl, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM audit_controls WHERE id = ?1 AND audit_run_id = ?2"
                ),
                [id, audit_run_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_audit_control(&row)?),
            None => Err(ServiceError::not_found("auditControl", id)),
        }
    }

    pub(crate) async fn controls_for_run(
        &self,
        audit_run_id: &str,
    ) -> Result<Vec<AuditControl>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM audit_controls
                     WHERE audit_run_id = ?1 ORDER BY created_at, rowid"
                ),
                [audit_run_id],
            )
            .await?;
        let mut controls = Vec::new();
        while let Some(row) = rows.next().await? {
            controls.push(row_to_audit_control(&row)?);
        }
        Ok(controls)
    }
}
