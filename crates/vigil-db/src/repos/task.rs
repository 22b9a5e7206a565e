//! Task repository: creation (from control assignment and findings), listing,
//! and updates.

use chrono::{DateTime, Utc};

use vigil_auth::{Resource, Verb};
use vigil_core::entities::{AuditRunActivity, Task};
use vigil_core::enums::{ActivityType, EntityType, TaskPriority, TaskStatus, TaskType};
use vigil_core::identity::AuthIdentity;
use vigil_core::ids::PREFIX_TASK;

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::{RowExt, opt_rfc3339};
use crate::queries::{Conditions, TaskQuery};
use crate::repos::activity::NewActivity;
use crate::repos::audit_run::ensure_unlocked;
use crate::service::VigilService;
use crate::updates::SetClauses;
use crate::updates::task::TaskUpdate;

const SELECT_COLS: &str = "id, organization_id, audit_run_id, audit_control_id, finding_id, \
                           title, description, task_type, status, priority, assignee_id, \
                           due_date, created_by, created_at, updated_at";

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    Ok(Task {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        audit_run_id: row.opt_text(2)?,
        audit_control_id: row.opt_text(3)?,
        finding_id: row.opt_text(4)?,
        title: row.get(5)?,
        description: row.opt_text(6)?,
        task_type: row.enum_value(7)?,
        status: row.enum_value(8)?,
        priority: row.enum_value(9)?,
        assignee_id: row.opt_text(10)?,
        due_date: row.opt_timestamp(11)?,
        created_by: row.get(12)?,
        created_at: row.timestamp(13)?,
        updated_at: row.timestamp(14)?,
    })
}

/// A task spawned as a side effect of another mutation.
pub(crate) struct NewTask<'a> {
    pub organization_id: &'a str,
    pub audit_run_id: Option<&'a str>,
    pub audit_control_id: Option<&'a str>,
    pub finding_id: Option<&'a str>,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub assignee_id: Option<&'a str>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: &'a str,
}

impl VigilService {
    /// Insert a task. Runs inside the caller's transaction.
    pub(crate) async fn insert_task(&self, new: NewTask<'_>) -> Result<Task, DatabaseError> {
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_TASK).await?;

        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO tasks ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                libsql::params![
                    id.as_str(),
                    new.organization_id,
                    new.audit_run_id,
                    new.audit_control_id,
                    new.finding_id,
                    new.title.as_str(),
                    new.description.as_deref(),
                    new.task_type.as_str(),
                    TaskStatus::Open.as_str(),
                    new.priority.as_str(),
                    new.assignee_id,
                    opt_rfc3339(new.due_date.as_ref()),
                    new.created_by,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        Ok(Task {
            id,
            organization_id: new.organization_id.to_string(),
            audit_run_id: new.audit_run_id.map(String::from),
            audit_control_id: new.audit_control_id.map(String::from),
            finding_id: new.finding_id.map(String::from),
            title: new.title,
            description: new.description,
            task_type: new.task_type,
            status: TaskStatus::Open,
            priority: new.priority,
            assignee_id: new.assignee_id.map(String::from),
            due_date: new.due_date,
            created_by: new.created_by.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_task(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
    ) -> Result<Task, ServiceError> {
        self.require_permission(identity, org_id, Resource::Task, Verb::Read)
            .await?;
        let _read = self.db().read().await;
        self.fetch_task(org_id, id).await
    }

    pub async fn list_tasks(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        query: &TaskQuery,
    ) -> Result<Vec<Task>, ServiceError> {
        self.require_permission(identity, org_id, Resource::Task, Verb::Read)
            .await?;
        let _read = self.db().read().await;

        let (limit, offset) = self.page(query.limit, query.offset);
        let mut conditions = Conditions::new(&[("organization_id", org_id)]);
        conditions.push_opt("audit_run_id", query.audit_run_id.as_deref());
        conditions.push_opt("finding_id", query.finding_id.as_deref());
        conditions.push_opt("assignee_id", query.assignee_id.as_deref());
        conditions.push_opt("status", query.status.map(TaskStatus::as_str));
        conditions.push_opt("priority", query.priority.map(TaskPriority::as_str));
        conditions.push_opt("task_type", query.task_type.map(TaskType::as_str));
        let (clause, params) = conditions.finish("created_at DESC, rowid DESC", limit, offset);

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM tasks{clause}"),
                libsql::params_from_iter(params),
            )
            .await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Update status, priority, assignee, or due date.
    ///
    /// Tasks under a locked run are read-only. Updates to tasks under a run
    /// are recorded as `TASK_UPDATED` on that run.
    pub async fn update_task(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
        update: TaskUpdate,
    ) -> Result<Task, ServiceError> {
        self.require_permission(identity, org_id, Resource::Task, Verb::Update)
            .await?;

        let guard = self.db().begin_write().await?;
        let result = self.apply_task_update(identity, org_id, id, &update).await;
        let (task, activity) = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(task_id = %task.id, status = %task.status, "task updated");
        if let Some(activity) = activity {
            self.publish(&[activity]);
        }
        Ok(task)
    }

    async fn apply_task_update(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        id: &str,
        update: &TaskUpdate,
    ) -> Result<(Task, Option<AuditRunActivity>), ServiceError> {
        let before = self.fetch_task(org_id, id).await?;
        if let Some(run_id) = &before.audit_run_id {
            let run = self.fetch_audit_run(org_id, run_id).await?;
            ensure_unlocked(&run)?;
        }
        if update.is_empty() {
            return Ok((before, None));
        }

        let mut sets = SetClauses::new();
        if let Some(status) = update.status {
            sets.set("status", status.as_str());
        }
        if let Some(priority) = update.priority {
            sets.set("priority", priority.as_str());
        }
        if let Some(assignee_id) = &update.assignee_id {
            if let Some(user_id) = assignee_id {
                self.ensure_member(org_id, user_id, "assignee").await?;
            }
            sets.set_nullable("assignee_id", assignee_id.clone());
        }
        if let Some(due_date) = &update.due_date {
            sets.set_nullable("due_date", opt_rfc3339(due_date.as_ref()));
        }
        let (sql, params) = sets.into_statement("tasks", &Utc::now().to_rfc3339(), id);
        self.db()
            .conn()
            .execute(&sql, libsql::params_from_iter(params))
            .await?;

        let after = self.fetch_task(org_id, id).await?;
        let activity = match &after.audit_run_id {
            Some(run_id) => Some(
                self.record_activity(NewActivity {
                    organization_id: org_id,
                    audit_run_id: run_id,
                    activity_type: ActivityType::TaskUpdated,
                    performed_by: &identity.user_id,
                    target_entity_type: EntityType::Task,
                    target_entity_id: id,
                    old_value: Some(serde_json::to_value(&before)?),
                    new_value: Some(serde_json::to_value(&after)?),
                })
                .await?,
            ),
            None => None,
        };

        Ok((after, activity))
    }

    /// Task `id` scoped to `org_id`; other tenants' tasks are not found.
    pub(crate) async fn fetch_task(&self, org_id: &str, id: &str) -> Result<Task, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM tasks WHERE id = ?1 AND organization_id = ?2"),
                [id, org_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_task(&row)?),
            None => Err(ServiceError::not_found("task", id)),
        }
    }

    pub(crate) async fn tasks_for_run(&self, audit_run_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM tasks
                     WHERE audit_run_id = ?1 ORDER BY created_at, rowid"
                ),
                [audit_run_id],
            )
            .await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }
}
