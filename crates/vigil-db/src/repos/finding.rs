//! Findings and their remediation tasks.
//!
//! A finding with an owner gets exactly one `REMEDIATION` task whose priority
//! follows [`FindingSeverity::remediation_priority`]. The task keeps tracking
//! the finding's severity and owner after creation.

use chrono::{DateTime, Utc};

use vigil_auth::{Resource, Verb};
use vigil_core::entities::{AuditFinding, AuditRunActivity, Task};
use vigil_core::enums::{ActivityType, EntityType, FindingSeverity, FindingStatus, TaskType};
use vigil_core::identity::AuthIdentity;
use vigil_core::ids::PREFIX_FINDING;
use vigil_core::responses::FindingCreateResponse;

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::{RowExt, opt_rfc3339};
use crate::queries::{Conditions, FindingQuery};
use crate::repos::activity::NewActivity;
use crate::repos::audit_run::ensure_unlocked;
use crate::repos::task::NewTask;
use crate::service::VigilService;
use crate::updates::SetClauses;
use crate::updates::finding::FindingUpdate;

const SELECT_COLS: &str = "id, organization_id, audit_run_id, control_id, audit_control_id, \
                           title, description, severity, status, owner_id, due_date, \
                           remediation_plan, created_by, created_at, updated_at";

fn row_to_finding(row: &libsql::Row) -> Result<AuditFinding, DatabaseError> {
    Ok(AuditFinding {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        audit_run_id: row.get(2)?,
        control_id: row.opt_text(3)?,
        audit_control_id: row.opt_text(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        severity: row.enum_value(7)?,
        status: row.enum_value(8)?,
        owner_id: row.opt_text(9)?,
        due_date: row.opt_timestamp(10)?,
        remediation_plan: row.opt_text(11)?,
        created_by: row.get(12)?,
        created_at: row.timestamp(13)?,
        updated_at: row.timestamp(14)?,
    })
}

/// Input for [`VigilService::create_finding`].
#[derive(Debug, Clone)]
pub struct NewFinding {
    pub organization_id: String,
    pub audit_run_id: String,
    pub severity: FindingSeverity,
    pub title: String,
    pub description: String,
    pub control_id: Option<String>,
    pub audit_control_id: Option<String>,
    pub owner_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub remediation_plan: Option<String>,
}

impl NewFinding {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.audit_run_id.trim().is_empty() {
            return Err(ServiceError::validation("auditRunId is required"));
        }
        if self.title.trim().is_empty() {
            return Err(ServiceError::validation("title is required"));
        }
        if self.description.trim().is_empty() {
            return Err(ServiceError::validation("description is required"));
        }
        Ok(())
    }
}

impl VigilService {
    /// Record a finding against an unlocked run.
    ///
    /// If an owner is given, a remediation task is created for them in the
    /// same transaction.
    pub async fn create_finding(
        &self,
        identity: &AuthIdentity,
        new: NewFinding,
    ) -> Result<FindingCreateResponse, ServiceError> {
        self.require_permission(identity, &new.organization_id, Resource::Finding, Verb::Create)
            .await?;
        if new.owner_id.is_some() {
            self.require_permission(identity, &new.organization_id, Resource::Finding, Verb::Assign)
                .await?;
        }
        new.validate()?;

        let guard = self.db().begin_write().await?;
        let result = self.insert_finding(identity, &new).await;
        let (response, activity) = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(
            finding_id = %response.finding.id,
            severity = %response.finding.severity,
            remediation_task = response.remediation_task.is_some(),
            "finding created"
        );
        self.publish(&[activity]);
        Ok(response)
    }

    async fn insert_finding(
        &self,
        identity: &AuthIdentity,
        new: &NewFinding,
    ) -> Result<(FindingCreateResponse, AuditRunActivity), ServiceError> {
        let org_id = new.organization_id.as_str();
        let run = self.fetch_unlocked_run(org_id, new.audit_run_id.trim()).await?;

        let mut control_id = new.control_id.clone();
        if let Some(id) = &new.control_id {
            self.fetch_control(org_id, id).await?;
        }
        if let Some(id) = &new.audit_control_id {
            let audit_control = self.fetch_audit_control(&run.id, id).await?;
            match &control_id {
                Some(given) if *given != audit_control.control_id => {
                    return Err(ServiceError::validation(format!(
                        "auditControlId {id} does not track control {given}"
                    )));
                }
                Some(_) => {}
                None => control_id = Some(audit_control.control_id),
            }
        }
        if let Some(owner_id) = &new.owner_id {
            self.ensure_member(org_id, owner_id, "owner").await?;
        }

        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_FINDING).await?;
        let finding = AuditFinding {
            id,
            organization_id: org_id.to_string(),
            audit_run_id: run.id.clone(),
            control_id,
            audit_control_id: new.audit_control_id.clone(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            severity: new.severity,
            status: FindingStatus::Open,
            owner_id: new.owner_id.clone(),
            due_date: new.due_date,
            remediation_plan: new.remediation_plan.clone(),
            created_by: identity.user_id.clone(),
            created_at: now,
            updated_at: now,
        };

        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO audit_findings ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                libsql::params![
                    finding.id.as_str(),
                    finding.organization_id.as_str(),
                    finding.audit_run_id.as_str(),
                    finding.control_id.as_deref(),
                    finding.audit_control_id.as_deref(),
                    finding.title.as_str(),
                    finding.description.as_str(),
                    finding.severity.as_str(),
                    finding.status.as_str(),
                    finding.owner_id.as_deref(),
                    opt_rfc3339(finding.due_date.as_ref()),
                    finding.remediation_plan.as_deref(),
                    finding.created_by.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        let remediation_task = match &finding.owner_id {
            Some(owner_id) => Some(
                self.insert_remediation_task(identity, &finding, owner_id)
                    .await?,
            ),
            None => None,
        };

        let activity = self
            .record_activity(NewActivity {
                organization_id: org_id,
                audit_run_id: &run.id,
                activity_type: ActivityType::FindingCreated,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::Finding,
                target_entity_id: &finding.id,
                old_value: None,
                new_value: Some(serde_json::to_value(&finding)?),
            })
            .await?;

        Ok((
            FindingCreateResponse {
                finding,
                remediation_task,
            },
            activity,
        ))
    }

    async fn insert_remediation_task(
        &self,
        identity: &AuthIdentity,
        finding: &AuditFinding,
        owner_id: &str,
    ) -> Result<Task, DatabaseError> {
        self.insert_task(NewTask {
            organization_id: &finding.organization_id,
            audit_run_id: Some(&finding.audit_run_id),
            audit_control_id: finding.audit_control_id.as_deref(),
            finding_id: Some(&finding.id),
            title: format!("Remediate: {}", finding.title),
            description: finding.remediation_plan.clone(),
            task_type: TaskType::Remediation,
            priority: finding.severity.remediation_priority(),
            assignee_id: Some(owner_id),
            due_date: finding.due_date,
            created_by: &identity.user_id,
        })
        .await
    }

    pub async fn get_finding(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
    ) -> Result<AuditFinding, ServiceError> {
        self.require_permission(identity, org_id, Resource::Finding, Verb::Read)
            .await?;
        let _read = self.db().read().await;
        self.fetch_finding(org_id, id).await
    }

    pub async fn list_findings(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        query: &FindingQuery,
    ) -> Result<Vec<AuditFinding>, ServiceError> {
        self.require_permission(identity, org_id, Resource::Finding, Verb::Read)
            .await?;
        let _read = self.db().read().await;

        let (limit, offset) = self.page(query.limit, query.offset);
        let mut conditions = Conditions::new(&[("organization_id", org_id)]);
        conditions.push_opt("audit_run_id", query.audit_run_id.as_deref());
        conditions.push_opt("severity", query.severity.map(FindingSeverity::as_str));
        conditions.push_opt("status", query.status.map(FindingStatus::as_str));
        conditions.push_opt("owner_id", query.owner_id.as_deref());
        let (clause, params) = conditions.finish("created_at DESC, rowid DESC", limit, offset);

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM audit_findings{clause}"),
                libsql::params_from_iter(params),
            )
            .await?;
        let mut findings = Vec::new();
        while let Some(row) = rows.next().await? {
            findings.push(row_to_finding(&row)?);
        }
        Ok(findings)
    }

    /// Update a finding on an unlocked run. Status writes are unconstrained.
    ///
    /// Assigning an owner to a finding that has no remediation task yet
    /// creates one. An existing remediation task is re-prioritized and
    /// reassigned when severity or owner change.
    pub async fn update_finding(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
        update: FindingUpdate,
    ) -> Result<AuditFinding, ServiceError> {
        self.require_permission(identity, org_id, Resource::Finding, Verb::Update)
            .await?;
        if update.owner_id.is_some() {
            self.require_permission(identity, org_id, Resource::Finding, Verb::Assign)
                .await?;
        }
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::validation("title must not be empty"));
        }
        if update.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(ServiceError::validation("description must not be empty"));
        }

        let guard = self.db().begin_write().await?;
        let result = self.apply_finding_update(identity, org_id, id, &update).await;
        let (finding, activity) = self.db().finish_write(result).await?;
        drop(guard);

        if let Some(activity) = activity {
            tracing::info!(finding_id = %finding.id, status = %finding.status, "finding updated");
            self.publish(&[activity]);
        }
        Ok(finding)
    }

    async fn apply_finding_update(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
        update: &FindingUpdate,
    ) -> Result<(AuditFinding, Option<AuditRunActivity>), ServiceError> {
        let before = self.fetch_finding(org_id, id).await?;
        let run = self.fetch_audit_run(org_id, &before.audit_run_id).await?;
        ensure_unlocked(&run)?;
        if update.is_empty() {
            return Ok((before, None));
        }

        let mut sets = SetClauses::new();
        if let Some(title) = &update.title {
            sets.set("title", title.trim().to_string());
        }
        if let Some(description) = &update.description {
            sets.set("description", description.trim().to_string());
        }
        if let Some(severity) = update.severity {
            sets.set("severity", severity.as_str());
        }
        if let Some(status) = update.status {
            sets.set("status", status.as_str());
        }
        if let Some(owner_id) = &update.owner_id {
            if let Some(user_id) = owner_id {
                self.ensure_member(org_id, user_id, "owner").await?;
            }
            sets.set_nullable("owner_id", owner_id.clone());
        }
        if let Some(due_date) = &update.due_date {
            sets.set_nullable("due_date", opt_rfc3339(due_date.as_ref()));
        }
        if let Some(plan) = &update.remediation_plan {
            sets.set_nullable("remediation_plan", plan.clone());
        }
        let (sql, params) = sets.into_statement("audit_findings", &Utc::now().to_rfc3339(), id);
        self.db()
            .conn()
            .execute(&sql, libsql::params_from_iter(params))
            .await?;

        let after = self.fetch_finding(org_id, id).await?;
        if self.has_remediation_task(&after.id).await? {
            if before.severity != after.severity || before.owner_id != after.owner_id {
                self.sync_remediation_task(&after).await?;
            }
        } else if let Some(owner_id) = after.owner_id.as_deref() {
            if before.owner_id.as_deref() != Some(owner_id) {
                self.insert_remediation_task(identity, &after, owner_id)
                    .await?;
            }
        }

        let activity = self
            .record_activity(NewActivity {
                organization_id: org_id,
                audit_run_id: &run.id,
                activity_type: ActivityType::FindingUpdated,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::Finding,
                target_entity_id: id,
                old_value: Some(serde_json::to_value(&before)?),
                new_value: Some(serde_json::to_value(&after)?),
            })
            .await?;

        Ok((after, Some(activity)))
    }

    async fn has_remediation_task(&self, finding_id: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT 1 FROM tasks WHERE finding_id = ?1 AND task_type = ?2 LIMIT 1",
                [finding_id, TaskType::Remediation.as_str()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn sync_remediation_task(&self, finding: &AuditFinding) -> Result<(), DatabaseError> {
        let updated = self
            .db()
            .conn()
            .execute(
                "UPDATE tasks SET priority = ?1, assignee_id = ?2, updated_at = ?3
                 WHERE finding_id = ?4 AND task_type = ?5",
                libsql::params![
                    finding.severity.remediation_priority().as_str(),
                    finding.owner_id.as_deref(),
                    Utc::now().to_rfc3339(),
                    finding.id.as_str(),
                    TaskType::Remediation.as_str()
                ],
            )
            .await?;
        tracing::debug!(finding_id = %finding.id, updated, "remediation task synced");
        Ok(())
    }

    /// Finding `id` scoped to `org_id`; other tenants' findings are not found.
    pub(crate) async fn fetch_finding(
        &self,
        org_id: &str,
        id: &str,
    ) -> Result<AuditFinding, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM audit_findings WHERE id = ?1 AND organization_id = ?2"
                ),
                [id, org_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_finding(&row)?),
            None => Err(ServiceError::not_found("finding", id)),
        }
    }

    pub(crate) async fn findings_for_run(
        &self,
        audit_run_id: &str,
    ) -> Result<Vec<AuditFinding>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM audit_findings
                     WHERE audit_run_id = ?1 ORDER BY created_at, rowid"
                ),
                [audit_run_id],
            )
            .await?;
        let mut findings = Vec::new();
        while let Some(row) = rows.next().await? {
            findings.push(row_to_finding(&row)?);
        }
        Ok(findings)
    }
}
