//! Users, organizations, and memberships.
//!
//! These are operator bootstrap operations driven by the `vigil` CLI, which
//! talks to the database directly. They carry no caller identity.

use chrono::Utc;

use vigil_core::entities::{OrgMembership, Organization, User};
use vigil_core::enums::{OrgRole, UserRole};
use vigil_core::ids::{PREFIX_ORGANIZATION, PREFIX_USER};

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::RowExt;
use crate::service::VigilService;

const USER_COLS: &str = "id, email, name, role, created_at";
const ORG_COLS: &str = "id, name, slug, created_at";
const MEMBERSHIP_COLS: &str = "organization_id, user_id, role, created_at";

fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.opt_text(2)?,
        role: row.enum_value(3)?,
        created_at: row.timestamp(4)?,
    })
}

fn row_to_organization(row: &libsql::Row) -> Result<Organization, DatabaseError> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at: row.timestamp(3)?,
    })
}

fn row_to_membership(row: &libsql::Row) -> Result<OrgMembership, DatabaseError> {
    Ok(OrgMembership {
        organization_id: row.get(0)?,
        user_id: row.get(1)?,
        role: row.enum_value(2)?,
        created_at: row.timestamp(3)?,
    })
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl VigilService {
    pub async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: UserRole,
    ) -> Result<User, ServiceError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(ServiceError::validation(format!("invalid email '{email}'")));
        }

        let guard = self.db().begin_write().await?;
        let result = self.insert_user(&email, name, role).await;
        let user = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(user_id = %user.id, %role, "user created");
        Ok(user)
    }

    async fn insert_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: UserRole,
    ) -> Result<User, ServiceError> {
        if self.user_by_email(email).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "a user with email '{email}' already exists"
            )));
        }

        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_USER).await?;
        self.db()
            .conn()
            .execute(
                &format!("INSERT INTO users ({USER_COLS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                libsql::params![id.as_str(), email, name, role.as_str(), now.to_rfc3339()],
            )
            .await?;

        Ok(User {
            id,
            email: email.to_string(),
            name: name.map(String::from),
            role,
            created_at: now,
        })
    }

    pub async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        let _read = self.db().read().await;
        self.fetch_user(id).await
    }

    /// Case-insensitive email lookup.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let _read = self.db().read().await;
        self.user_by_email(email).await
    }

    pub(crate) async fn fetch_user(&self, id: &str) -> Result<User, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(&format!("SELECT {USER_COLS} FROM users WHERE id = ?1"), [id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_user(&row)?),
            None => Err(ServiceError::not_found("user", id)),
        }
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
                [email.trim().to_lowercase()],
            )
            .await?;
        rows.next().await?.map(|row| row_to_user(&row)).transpose()
    }

    pub async fn create_organization(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Organization, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("organization name is required"));
        }
        if !is_valid_slug(slug) {
            return Err(ServiceError::validation(format!(
                "invalid slug '{slug}': use lowercase letters, digits and dashes"
            )));
        }

        let guard = self.db().begin_write().await?;
        let result = self.insert_organization(name, slug).await;
        let org = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(org_id = %org.id, slug = %org.slug, "organization created");
        Ok(org)
    }

    async fn insert_organization(&self, name: &str, slug: &str) -> Result<Organization, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query("SELECT 1 FROM organizations WHERE slug = ?1", [slug])
            .await?;
        if rows.next().await?.is_some() {
            return Err(ServiceError::validation(format!(
                "an organization with slug '{slug}' already exists"
            )));
        }

        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_ORGANIZATION).await?;
        self.db()
            .conn()
            .execute(
                &format!("INSERT INTO organizations ({ORG_COLS}) VALUES (?1, ?2, ?3, ?4)"),
                libsql::params![id.as_str(), name, slug, now.to_rfc3339()],
            )
            .await?;

        Ok(Organization {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: now,
        })
    }

    pub async fn get_organization(&self, id: &str) -> Result<Organization, ServiceError> {
        let _read = self.db().read().await;
        self.fetch_organization(id).await
    }

    pub(crate) async fn fetch_organization(&self, id: &str) -> Result<Organization, ServiceError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {ORG_COLS} FROM organizations WHERE id = ?1"),
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row_to_organization(&row)?),
            None => Err(ServiceError::not_found("organization", id)),
        }
    }

    /// Add `user_id` to `org_id`, or change the role of an existing member.
    pub async fn add_member(
        &self,
        org_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> Result<OrgMembership, ServiceError> {
        let guard = self.db().begin_write().await?;
        let result = self.upsert_membership(org_id, user_id, role).await;
        let membership = self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(org_id, user_id, %role, "membership set");
        Ok(membership)
    }

    async fn upsert_membership(
        &self,
        org_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> Result<OrgMembership, ServiceError> {
        self.fetch_organization(org_id).await?;
        self.fetch_user(user_id).await?;

        let now = Utc::now();
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO org_memberships ({MEMBERSHIP_COLS}) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (organization_id, user_id) DO UPDATE SET role = excluded.role"
                ),
                libsql::params![org_id, user_id, role.as_str(), now.to_rfc3339()],
            )
            .await?;

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {MEMBERSHIP_COLS} FROM org_memberships
                     WHERE organization_id = ?1 AND user_id = ?2"
                ),
                [org_id, user_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row_to_membership(&row)?)
    }

    pub async fn list_members(&self, org_id: &str) -> Result<Vec<OrgMembership>, DatabaseError> {
        let _read = self.db().read().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {MEMBERSHIP_COLS} FROM org_memberships
                     WHERE organization_id = ?1 ORDER BY created_at, user_id"
                ),
                [org_id],
            )
            .await?;
        let mut members = Vec::new();
        while let Some(row) = rows.next().await? {
            members.push(row_to_membership(&row)?);
        }
        Ok(members)
    }

    /// Role held by `user_id` in `org_id`, if any. Callers hold the
    /// connection lock.
    pub(crate) async fn membership_role(
        &self,
        user_id: &str,
        org_id: &str,
    ) -> Result<Option<OrgRole>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT role FROM org_memberships WHERE organization_id = ?1 AND user_id = ?2",
                [org_id, user_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.enum_value(0)?)),
            None => Ok(None),
        }
    }

    /// Fail with a validation error unless `user_id` belongs to `org_id`.
    pub(crate) async fn ensure_member(
        &self,
        org_id: &str,
        user_id: &str,
        field: &str,
    ) -> Result<(), ServiceError> {
        if self.membership_role(user_id, org_id).await?.is_some() {
            Ok(())
        } else {
            Err(ServiceError::validation(format!(
                "{field} {user_id} is not a member of the organization"
            )))
        }
    }
}
