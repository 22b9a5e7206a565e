//! Framework and control catalog, per organization.

use chrono::Utc;

use vigil_auth::{Resource, Verb};
use vigil_core::entities::{Control, Framework};
use vigil_core::identity::AuthIdentity;
use vigil_core::ids::{PREFIX_CONTROL, PREFIX_FRAMEWORK};

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::RowExt;
use crate::service::VigilService;

const FRAMEWORK_COLS: &str = "id, organization_id, name, version, created_at";
const CONTROL_COLS: &str =
    "id, organization_id, framework_id, code, title, description, created_at, updated_at";

fn row_to_framework(row: &libsql::Row) -> Result<Framework, DatabaseError> {
    Ok(Framework {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        version: row.opt_text(3)?,
        created_at: row.timestamp(4)?,
    })
}

fn row_to_control(row: &libsql::Row) -> Result<Control, DatabaseError> {
    Ok(Control {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        framework_id: row.get(2)?,
        code: row.get(3)?,
        title: row.get(4)?,
        description: row.opt_text(5)?,
        created_at: row.timestamp(6)?,
        updated_at: row.timestamp(7)?,
    })
}

/// Input for [`VigilService::create_control`].
#[derive(Debug, Clone)]
pub struct NewControl {
    pub organization_id: String,
    pub framework_id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
}

impl VigilService {
    pub async fn create_framework(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<Framework, ServiceError> {
        self.require_permission(identity, org_id, Resource::Catalog, Verb::Create)
            .await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("name is required"));
        }

        let guard = self.db().begin_write().await?;
        let result = self.insert_framework(org_id, name, version).await;
        let framework = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(framework_id = %framework.id, org_id, "framework created");
        Ok(framework)
    }

    async fn insert_framework(
        &self,
        org_id: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<Framework, ServiceError> {
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_FRAMEWORK).await?;
        self.db()
            .conn()
            .execute(
                &format!("INSERT INTO frameworks ({FRAMEWORK_COLS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                libsql::params![id.as_str(), org_id, name, version, now.to_rfc3339()],
            )
            .await?;

        Ok(Framework {
            id,
            organization_id: org_id.to_string(),
            name: name.to_string(),
            version: version.map(String::from),
            created_at: now,
        })
    }

    pub async fn list_frameworks(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
    ) -> Result<Vec<Framework>, ServiceError> {
        self.require_permission(identity, org_id, Resource::Catalog, Verb::Read)
            .await?;
        let _read = self.db().read().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {FRAMEWORK_COLS} FROM frameworks
                     WHERE organization_id = ?1 ORDER BY name, created_at"
                ),
                [org_id],
            )
            .await?;
        let mut frameworks = Vec::new();
        while let Some(row) = rows.next().await? {
            frameworks.push(row_to_framework(&row)?);
        }
        Ok(frameworks)
    }

    /// Framework `id` scoped to `org_id`; other tenants' frameworks are not found.
    pub(crate) async fn fetch_framework(
        &self,
        org_id: &str,
        id: &str,
    ) -> Result<Framework, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {FRAMEWORK_COLS} FROM frameworks WHERE id = ?1 AND organization_id = ?2"
                ),
                [id, org_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_framework(&row)?),
            None => Err(ServiceError::not_found("framework", id)),
        }
    }

    pub async fn create_control(
        &self,
        identity: &AuthIdentity,
        new: NewControl,
    ) -> Result<Control, ServiceError> {
        self.require_permission(identity, &new.organization_id, Resource::Catalog, Verb::Create)
            .await?;
        if new.code.trim().is_empty() {
            return Err(ServiceError::validation("code is required"));
        }
        if new.title.trim().is_empty() {
            return Err(ServiceError::validation("title is required"));
        }

        let guard = self.db().begin_write().await?;
        let result = self.insert_control(&new).await;
        let control = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(control_id = %control.id, code = %control.code, "control created");
        Ok(control)
    }

    async fn insert_control(&self, new: &NewControl) -> Result<Control, ServiceError> {
        self.fetch_framework(&new.organization_id, &new.framework_id)
            .await?;
        let code = new.code.trim();

        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT 1 FROM controls WHERE framework_id = ?1 AND code = ?2",
                [new.framework_id.as_str(), code],
            )
            .await?;
        if rows.next().await?.is_some() {
            return Err(ServiceError::validation(format!(
                "control code '{code}' already exists in this framework"
            )));
        }

        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_CONTROL).await?;
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO controls ({CONTROL_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                libsql::params![
                    id.as_str(),
                    new.organization_id.as_str(),
                    new.framework_id.as_str(),
                    code,
                    new.title.trim(),
                    new.description.as_deref(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        Ok(Control {
            id,
            organization_id: new.organization_id.clone(),
            framework_id: new.framework_id.clone(),
            code: code.to_string(),
            title: new.title.trim().to_string(),
            description: new.description.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn list_controls(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        framework_id: Option<&str>,
    ) -> Result<Vec<Control>, ServiceError> {
        self.require_permission(identity, org_id, Resource::Catalog, Verb::Read)
            .await?;
        let _read = self.db().read().await;
        let mut rows = match framework_id {
            Some(framework_id) => {
                self.db()
                    .conn()
                    .query(
                        &format!(
                            "SELECT {CONTROL_COLS} FROM controls
                             WHERE organization_id = ?1 AND framework_id = ?2 ORDER BY code"
                        ),
                        [org_id, framework_id],
                    )
                    .await?
            }
            None => {
                self.db()
                    .conn()
                    .query(
                        &format!(
                            "SELECT {CONTROL_COLS} FROM controls
                             WHERE organization_id = ?1 ORDER BY framework_id, code"
                        ),
                        [org_id],
                    )
                    .await?
            }
        };
        let mut controls = Vec::new();
        while let Some(row) = rows.next().await? {
            controls.push(row_to_control(&row)?);
        }
        Ok(controls)
    }

    /// Control `id` scoped to `org_id`; other tenants' controls are not found.
    pub(crate) async fn fetch_control(&self, org_id: &str, id: &str) -> Result<Control, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {CONTROL_COLS} FROM controls WHERE id = ?1 AND organization_id = ?2"
                ),
                [id, org_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_control(&row)?),
            None => Err(ServiceError::not_found("control", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use pretty_assertions::assert_eq;
    use vigil_core::errors::CoreError;

    #[tokio::test]
    async fn compliance_officer_builds_catalog() {
        let fx = Fixture::new().await;
        let framework = fx
            .svc
            .create_framework(&fx.officer, &fx.org_id, "ISO 27001", Some("2022"))
            .await
            .unwrap();
        let control = fx
            .svc
            .create_control(
                &fx.officer,
                NewControl {
                    organization_id: fx.org_id.clone(),
                    framework_id: framework.id.clone(),
                    code: " A.5.1 ".into(),
                    title: "Policies for information security".into(),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(control.code, "A.5.1");

        let listed = fx
            .svc
            .list_controls(&fx.viewer, &fx.org_id, Some(&framework.id))
            .await
            .unwrap();
        assert_eq!(listed, vec![control]);

        let frameworks = fx.svc.list_frameworks(&fx.viewer, &fx.org_id).await.unwrap();
        assert_eq!(frameworks.len(), 2);
    }

    #[tokio::test]
    async fn audit_manager_cannot_edit_catalog() {
        let fx = Fixture::new().await;
        let err = fx
            .svc
            .create_framework(&fx.manager, &fx.org_id, "NIST", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient permissions");
    }

    #[tokio::test]
    async fn duplicate_control_code_is_rejected() {
        let fx = Fixture::new().await;
        let err = fx
            .svc
            .create_control(
                &fx.officer,
                NewControl {
                    organization_id: fx.org_id.clone(),
                    framework_id: fx.framework_id.clone(),
                    code: "CC1.1".into(),
                    title: "Duplicate".into(),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn control_in_foreign_framework_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .svc
            .create_control(
                &fx.officer,
                NewControl {
                    organization_id: fx.org_id.clone(),
                    framework_id: "fwk-0000000000000000".into(),
                    code: "X".into(),
                    title: "X".into(),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NotFound { .. })));
    }
}
