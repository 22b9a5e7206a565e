//! Append-only audit run activity log.
//!
//! Rows are inserted by the mutation that caused them, inside its
//! transaction. Triggers reject UPDATE and DELETE on the table, and there is
//! no foreign key to `audit_runs`, so history outlives a deleted run.

use chrono::Utc;

use vigil_auth::{Resource, Verb};
use vigil_core::entities::AuditRunActivity;
use vigil_core::enums::{ActivityType, EntityType};
use vigil_core::identity::AuthIdentity;
use vigil_core::ids::PREFIX_ACTIVITY;
use vigil_core::responses::ActivityPage;

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::RowExt;
use crate::queries::{ActivityQuery, Conditions};
use crate::service::VigilService;

const SELECT_COLS: &str = "id, audit_run_id, activity_type, performed_by, target_entity_type, \
                           target_entity_id, old_value, new_value, created_at";

fn row_to_activity(row: &libsql::Row) -> Result<AuditRunActivity, DatabaseError> {
    Ok(AuditRunActivity {
        id: row.get(0)?,
        audit_run_id: row.get(1)?,
        activity_type: row.enum_value(2)?,
        performed_by: row.get(3)?,
        target_entity_type: row.enum_value(4)?,
        target_entity_id: row.get(5)?,
        old_value: row.opt_json(6)?,
        new_value: row.opt_json(7)?,
        created_at: row.timestamp(8)?,
    })
}

/// One activity entry to append.
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub organization_id: &'a str,
    pub audit_run_id: &'a str,
    pub activity_type: ActivityType,
    pub performed_by: &'a str,
    pub target_entity_type: EntityType,
    pub target_entity_id: &'a str,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
}

impl VigilService {
    /// Append one entry to an audit run's activity log.
    ///
    /// Mutations call this inside their own transaction; it never takes the
    /// writer lock itself.
    pub async fn record_activity(
        &self,
        entry: NewActivity<'_>,
    ) -> Result<AuditRunActivity, DatabaseError> {
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_ACTIVITY).await?;
        let old_json = entry
            .old_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let new_json = entry
            .new_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.db()
            .conn()
            .execute(
                "INSERT INTO audit_run_activities
                 (id, organization_id, audit_run_id, activity_type, performed_by,
                  target_entity_type, target_entity_id, old_value, new_value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                libsql::params![
                    id.as_str(),
                    entry.organization_id,
                    entry.audit_run_id,
                    entry.activity_type.as_str(),
                    entry.performed_by,
                    entry.target_entity_type.as_str(),
                    entry.target_entity_id,
                    old_json,
                    new_json,
                    now.to_rfc3339()
                ],
            )
            .await?;

        tracing::debug!(
            activity_id = %id,
            audit_run_id = entry.audit_run_id,
            activity_type = %entry.activity_type,
            "activity recorded"
        );

        Ok(AuditRunActivity {
            id,
            audit_run_id: entry.audit_run_id.to_string(),
            activity_type: entry.activity_type,
            performed_by: entry.performed_by.to_string(),
            target_entity_type: entry.target_entity_type,
            target_entity_id: entry.target_entity_id.to_string(),
            old_value: entry.old_value,
            new_value: entry.new_value,
            created_at: now,
        })
    }

    /// Page through a run's activity, newest first.
    ///
    /// Works for deleted runs as long as they left history in `org_id`.
    pub async fn list_activity(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        audit_run_id: &str,
        query: &ActivityQuery,
    ) -> Result<ActivityPage, ServiceError> {
        self.require_permission(identity, org_id, Resource::Activity, Verb::Read)
            .await?;
        let _read = self.db().read().await;

        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT 1 FROM audit_runs WHERE id = ?1 AND organization_id = ?2
                 UNION ALL
                 SELECT 1 FROM audit_run_activities WHERE audit_run_id = ?1 AND organization_id = ?2
                 LIMIT 1",
                [audit_run_id, org_id],
            )
            .await?;
        if rows.next().await?.is_none() {
            return Err(ServiceError::not_found("auditRun", audit_run_id));
        }

        let (limit, offset) = self.activity_page(query.limit, query.offset);
        let mut conditions = Conditions::new(&[
            ("organization_id", org_id),
            ("audit_run_id", audit_run_id),
        ]);
        conditions.push_opt("activity_type", query.activity_type.map(ActivityType::as_str));
        conditions.push_opt("performed_by", query.performed_by.as_deref());
        let entries = self
            .query_activity(conditions, limit, offset)
            .await?;

        Ok(ActivityPage {
            entries,
            limit,
            offset,
        })
    }

    /// Latest `limit` entries for a run, newest first. No permission check.
    pub(crate) async fn recent_activity(
        &self,
        org_id: &str,
        audit_run_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditRunActivity>, DatabaseError> {
        let conditions = Conditions::new(&[
            ("organization_id", org_id),
            ("audit_run_id", audit_run_id),
        ]);
        self.query_activity(conditions, limit, 0).await
    }

    async fn query_activity(
        &self,
        conditions: Conditions,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<AuditRunActivity>, DatabaseError> {
        let (clause, params) = conditions.finish("created_at DESC, rowid DESC", limit, offset);
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM audit_run_activities{clause}"),
                libsql::params_from_iter(params),
            )
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_activity(&row)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn record_then_list_newest_first() {
        let fx = Fixture::new().await;
        let run = fx.create_run("FY26").await;

        fx.svc
            .record_activity(NewActivity {
                organization_id: &fx.org_id,
                audit_run_id: &run.id,
                activity_type: ActivityType::RunUpdated,
                performed_by: &fx.manager.user_id,
                target_entity_type: EntityType::AuditRun,
                target_entity_id: &run.id,
                old_value: Some(json!({"name": "FY26"})),
                new_value: Some(json!({"name": "FY26 H1"})),
            })
            .await
            .unwrap();

        let page = fx
            .svc
            .list_activity(&fx.viewer, &fx.org_id, &run.id, &ActivityQuery::default())
            .await
            .unwrap();
        assert_eq!(page.limit, 50);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].activity_type, ActivityType::RunUpdated);
        assert_eq!(page.entries[0].new_value, Some(json!({"name": "FY26 H1"})));
        assert_eq!(page.entries[1].activity_type, ActivityType::RunCreated);
    }

    #[tokio::test]
    async fn page_size_is_capped_and_filters_apply() {
        let fx = Fixture::new().await;
        let run = fx.create_run("FY26").await;

        let query = ActivityQuery {
            activity_type: Some(ActivityType::RunCreated),
            limit: Some(500),
            ..ActivityQuery::default()
        };
        let page = fx
            .svc
            .list_activity(&fx.viewer, &fx.org_id, &run.id, &query)
            .await
            .unwrap();
        assert_eq!(page.limit, 50);
        assert_eq!(page.entries.len(), 1);

        let query = ActivityQuery {
            performed_by: Some(fx.viewer.user_id.clone()),
            ..ActivityQuery::default()
        };
        let page = fx
            .svc
            .list_activity(&fx.viewer, &fx.org_id, &run.id, &query)
            .await
            .unwrap();
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn unknown_run_is_not_found_and_outsiders_are_forbidden() {
        let fx = Fixture::new().await;
        let run = fx.create_run("FY26").await;

        let err = fx
            .svc
            .list_activity(&fx.viewer, &fx.org_id, "run-0000000000000000", &ActivityQuery::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let err = fx
            .svc
            .list_activity(&fx.outsider, &fx.org_id, &run.id, &ActivityQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient permissions");
    }
}
