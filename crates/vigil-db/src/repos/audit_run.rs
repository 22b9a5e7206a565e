//! Audit run lifecycle: create, read, list, update, lock, delete.
//!
//! A run in status `LOCKED` is frozen. Every mutation of the run or of its
//! children re-reads the run inside the write transaction and fails with
//! [`ServiceError::Locked`] if it is locked.

use chrono::{DateTime, Utc};

use vigil_auth::{Resource, Verb};
use vigil_core::entities::{AuditRun, AuditRunActivity};
use vigil_core::enums::{ActivityType, AuditRunStatus, EntityType};
use vigil_core::identity::AuthIdentity;
use vigil_core::ids::PREFIX_AUDIT_RUN;
use vigil_core::responses::AuditRunDetail;

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::{RowExt, opt_rfc3339};
use crate::queries::{AuditRunQuery, Conditions};
use crate::repos::activity::NewActivity;
use crate::service::VigilService;
use crate::updates::SetClauses;
use crate::updates::audit_run::AuditRunUpdate;

const SELECT_COLS: &str = "id, organization_id, framework_id, name, description, status, \
                           creator_id, start_date, end_date, created_at, updated_at";

fn row_to_audit_run(row: &libsql::Row) -> Result<AuditRun, DatabaseError> {
    Ok(AuditRun {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        framework_id: row.get(2)?,
        name: row.get(3)?,
        description: row.opt_text(4)?,
        status: row.enum_value(5)?,
        creator_id: row.get(6)?,
        start_date: row.opt_timestamp(7)?,
        end_date: row.opt_timestamp(8)?,
        created_at: row.timestamp(9)?,
        updated_at: row.timestamp(10)?,
    })
}

fn validate_window(
    start: Option<&DateTime<Utc>>,
    end: Option<&DateTime<Utc>>,
) -> Result<(), ServiceError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ServiceError::validation(
            "endDate must not be before startDate",
        )),
        _ => Ok(()),
    }
}

/// Fail with [`ServiceError::Locked`] if `run` is locked.
pub(crate) fn ensure_unlocked(run: &AuditRun) -> Result<(), ServiceError> {
    if run.status.is_locked() {
        Err(ServiceError::Locked {
            audit_run_id: run.id.clone(),
        })
    } else {
        Ok(())
    }
}

/// Input for [`VigilService::create_audit_run`].
#[derive(Debug, Clone)]
pub struct NewAuditRun {
    pub organization_id: String,
    pub framework_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `PLANNING`.
    pub status: Option<AuditRunStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl VigilService {
    pub async fn create_audit_run(
        &self,
        identity: &AuthIdentity,
        new: NewAuditRun,
    ) -> Result<AuditRun, ServiceError> {
        self.require_permission(identity, &new.organization_id, Resource::AuditRun, Verb::Create)
            .await?;
        if new.name.trim().is_empty() {
            return Err(ServiceError::validation("name is required"));
        }
        if new.framework_id.trim().is_empty() {
            return Err(ServiceError::validation("frameworkId is required"));
        }
        if new.status.is_some_and(AuditRunStatus::is_locked) {
            return Err(ServiceError::validation(
                "an audit run cannot be created locked",
            ));
        }
        validate_window(new.start_date.as_ref(), new.end_date.as_ref())?;

        let guard = self.db().begin_write().await?;
        let result = self.insert_audit_run(identity, &new).await;
        let (run, activity) = self.db().finish_write(result).await?;
        drop(guard);

        self.publish(&[activity]);
        tracing::info!(
            audit_run_id = %run.id,
            org_id = %run.organization_id,
            user_id = %identity.user_id,
            "audit run created"
        );
        Ok(run)
    }

    async fn insert_audit_run(
        &self,
        identity: &AuthIdentity,
        new: &NewAuditRun,
    ) -> Result<(AuditRun, AuditRunActivity), ServiceError> {
        self.fetch_framework(&new.organization_id, &new.framework_id)
            .await?;

        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_AUDIT_RUN).await?;
        let status = new.status.unwrap_or(AuditRunStatus::Planning);
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO audit_runs ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                libsql::params![
                    id.as_str(),
                    new.organization_id.as_str(),
                    new.framework_id.as_str(),
                    new.name.trim(),
                    new.description.as_deref(),
                    status.as_str(),
                    identity.user_id.as_str(),
                    opt_rfc3339(new.start_date.as_ref()),
                    opt_rfc3339(new.end_date.as_ref()),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        let run = AuditRun {
            id,
            organization_id: new.organization_id.clone(),
            framework_id: new.framework_id.clone(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            status,
            creator_id: identity.user_id.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: now,
            updated_at: now,
        };

        let activity = self
            .record_activity(NewActivity {
                organization_id: &run.organization_id,
                audit_run_id: &run.id,
                activity_type: ActivityType::RunCreated,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::AuditRun,
                target_entity_id: &run.id,
                old_value: None,
                new_value: Some(serde_json::to_value(&run)?),
            })
            .await?;

        Ok((run, activity))
    }

    /// The run with its controls, findings, tasks, and most recent activity.
    pub async fn get_audit_run(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
    ) -> Result<AuditRunDetail, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditRun, Verb::Read)
            .await?;
        let _read = self.db().read().await;
        let audit_run = self.fetch_audit_run(org_id, id).await?;

        let controls = self.controls_for_run(&audit_run.id).await?;
        let findings = self.findings_for_run(&audit_run.id).await?;
        let tasks = self.tasks_for_run(&audit_run.id).await?;
        let activity = self
            .recent_activity(org_id, &audit_run.id, self.limits().activity_limit)
            .await?;

        Ok(AuditRunDetail {
            audit_run,
            controls,
            findings,
            tasks,
            activity,
        })
    }

    pub async fn list_audit_runs(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        query: &AuditRunQuery,
    ) -> Result<Vec<AuditRun>, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditRun, Verb::Read)
            .await?;
        let _read = self.db().read().await;

        let (limit, offset) = self.page(query.limit, query.offset);
        let mut conditions = Conditions::new(&[("organization_id", org_id)]);
        conditions.push_opt("status", query.status.map(AuditRunStatus::as_str));
        conditions.push_opt("framework_id", query.framework_id.as_deref());
        let (clause, params) = conditions.finish("created_at DESC, rowid DESC", limit, offset);

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM audit_runs{clause}"),
                libsql::params_from_iter(params),
            )
            .await?;
        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(row_to_audit_run(&row)?);
        }
        Ok(runs)
    }

    /// Apply `update` to an unlocked run. Moving the status to `LOCKED`
    /// requires the lock permission and is recorded as `RUN_LOCKED`.
    pub async fn update_audit_run(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
        update: AuditRunUpdate,
    ) -> Result<AuditRun, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditRun, Verb::Update)
            .await?;
        if update.status.is_some_and(AuditRunStatus::is_locked) {
            self.require_permission(identity, org_id, Resource::AuditRun, Verb::Lock)
                .await?;
        }
        if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ServiceError::validation("name must not be empty"));
        }

        let guard = self.db().begin_write().await?;
        let result = self.apply_audit_run_update(identity, org_id, id, &update).await;
        let (run, activity) = self.db().finish_write(result).await?;
        drop(guard);

        if let Some(activity) = activity {
            tracing::info!(audit_run_id = %run.id, activity_type = %activity.activity_type, "audit run updated");
            self.publish(&[activity]);
        }
        Ok(run)
    }

    async fn apply_audit_run_update(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
        update: &AuditRunUpdate,
    ) -> Result<(AuditRun, Option<AuditRunActivity>), ServiceError> {
        let before = self.fetch_audit_run(org_id, id).await?;
        ensure_unlocked(&before)?;
        if update.is_empty() {
            return Ok((before, None));
        }

        let start = update.start_date.unwrap_or(before.start_date);
        let end = update.end_date.unwrap_or(before.end_date);
        validate_window(start.as_ref(), end.as_ref())?;

        let mut sets = SetClauses::new();
        if let Some(name) = &update.name {
            sets.set("name", name.trim().to_string());
        }
        if let Some(description) = &update.description {
            sets.set_nullable("description", description.clone());
        }
        if let Some(status) = update.status {
            sets.set("status", status.as_str());
        }
        if let Some(start_date) = &update.start_date {
            sets.set_nullable("start_date", opt_rfc3339(start_date.as_ref()));
        }
        if let Some(end_date) = &update.end_date {
            sets.set_nullable("end_date", opt_rfc3339(end_date.as_ref()));
        }
        let (sql, params) = sets.into_statement("audit_runs", &Utc::now().to_rfc3339(), id);
        self.db()
            .conn()
            .execute(&sql, libsql::params_from_iter(params))
            .await?;

        let after = self.fetch_audit_run(org_id, id).await?;
        let activity_type = if after.status.is_locked() {
            ActivityType::RunLocked
        } else {
            ActivityType::RunUpdated
        };
        let activity = self
            .record_activity(NewActivity {
                organization_id: org_id,
                audit_run_id: id,
                activity_type,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::AuditRun,
                target_entity_id: id,
                old_value: Some(serde_json::to_value(&before)?),
                new_value: Some(serde_json::to_value(&after)?),
            })
            .await?;

        Ok((after, Some(activity)))
    }

    /// Move a run to `LOCKED`. Locking is terminal.
    pub async fn lock_audit_run(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
    ) -> Result<AuditRun, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditRun, Verb::Lock)
            .await?;
        let update = AuditRunUpdate {
            status: Some(AuditRunStatus::Locked),
            ..AuditRunUpdate::default()
        };

        let guard = self.db().begin_write().await?;
        let result = self.apply_audit_run_update(identity, org_id, id, &update).await;
        let (run, activity) = self.db().finish_write(result).await?;
        drop(guard);

        if let Some(activity) = activity {
            self.publish(&[activity]);
        }
        tracing::info!(audit_run_id = %run.id, user_id = %identity.user_id, "audit run locked");
        Ok(run)
    }

    /// Delete an unlocked run and, by cascade, its controls, findings, and
    /// tasks. Returns the final snapshot.
    pub async fn delete_audit_run(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
    ) -> Result<AuditRun, ServiceError> {
        self.require_permission(identity, org_id, Resource::AuditRun, Verb::Delete)
            .await?;

        let guard = self.db().begin_write().await?;
        let result = self.remove_audit_run(identity, org_id, id).await;
        let (run, activity) = self.db().finish_write(result).await?;
        drop(guard);

        self.publish(&[activity]);
        tracing::info!(audit_run_id = %run.id, user_id = %identity.user_id, "audit run deleted");
        Ok(run)
    }

    async fn remove_audit_run(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
    ) -> Result<(AuditRun, AuditRunActivity), ServiceError> {
        let run = self.fetch_audit_run(org_id, id).await?;
        ensure_unlocked(&run)?;

        self.db()
            .conn()
            .execute(
                "DELETE FROM audit_runs WHERE id = ?1 AND organization_id = ?2",
                [id, org_id],
            )
            .await?;

        let activity = self
            .record_activity(NewActivity {
                organization_id: org_id,
                audit_run_id: id,
                activity_type: ActivityType::RunDeleted,
                performed_by: &identity.user_id,
                target_entity_type: EntityType::AuditRun,
                target_entity_id: id,
                old_value: Some(serde_json::to_value(&run)?),
                new_value: None,
            })
            .await?;

        Ok((run, activity))
    }

    /// Run `id` scoped to `org_id`; runs in other organizations are not found.
    pub(crate) async fn fetch_audit_run(
        &self,
        org_id: &str,
        id: &str,
    ) -> Result<AuditRun, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM audit_runs WHERE id = ?1 AND organization_id = ?2"),
                [id, org_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_audit_run(&row)?),
            None => Err(ServiceError::not_found("auditRun", id)),
        }
    }

    /// Like [`Self::fetch_audit_run`], but fails if the run is locked.
    pub(crate) async fn fetch_unlocked_run(
        &self,
        org_id: &str,
        id: &str,
    ) -> Result<AuditRun, ServiceError> {
        let run = self.fetch_audit_run(org_id, id).await?;
        ensure_unlocked(&run)?;
        Ok(run)
    }
}
