//! Service layer orchestrating database mutations with permission checks and
//! the activity log.
//!
//! `VigilService` wraps `VigilDb` and an optional [`ActivitySink`]. All repo
//! methods are implemented as `impl VigilService` blocks under `repos/`.

use std::sync::Arc;

use vigil_auth::{Resource, Verb};
use vigil_config::{DatabaseConfig, GeneralConfig};
use vigil_core::entities::AuditRunActivity;
use vigil_core::enums::OrgRole;
use vigil_core::identity::AuthIdentity;

use crate::VigilDb;
use crate::error::{DatabaseError, ServiceError};
use crate::queries::MAX_PAGE_SIZE;

/// Receives every activity entry after its transaction commits.
pub trait ActivitySink: Send + Sync {
    fn publish(&self, activity: &AuditRunActivity);
}

/// Page size limits applied to list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub activity_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::from(&GeneralConfig::default())
    }
}

impl From<&GeneralConfig> for PageLimits {
    fn from(general: &GeneralConfig) -> Self {
        Self {
            default_limit: general.default_limit,
            activity_limit: general.activity_limit,
        }
    }
}

/// Orchestrates database mutations with permission checks and activity.
///
/// Every mutation method follows this protocol:
/// 1. Check the caller's organization permission
/// 2. Take the writer lock and begin a transaction
/// 3. Check the run lock and execute SQL
/// 4. Append the activity entry (inside the transaction)
/// 5. Commit, or roll back on any error
/// 6. Publish the committed activity to the sink
pub struct VigilService {
    db: VigilDb,
    sink: Option<Arc<dyn ActivitySink>>,
    limits: PageLimits,
}

impl VigilService {
    /// Create a new service wrapping a local database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        let db = VigilDb::open_local(db_path).await?;
        Ok(Self::from_db(db))
    }

    /// Create a service from the `database` and `general` config sections.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn from_config(
        database: &DatabaseConfig,
        general: &GeneralConfig,
    ) -> Result<Self, DatabaseError> {
        let db = VigilDb::open_local(&database.path).await?;
        Ok(Self::from_db(db).with_limits(PageLimits::from(general)))
    }

    /// Create from an existing `VigilDb` (for testing).
    #[must_use]
    pub fn from_db(db: VigilDb) -> Self {
        Self {
            db,
            sink: None,
            limits: PageLimits::default(),
        }
    }

    #[must_use]
    pub fn with_activity_sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &VigilDb {
        &self.db
    }

    #[must_use]
    pub const fn limits(&self) -> PageLimits {
        self.limits
    }

    /// Resolve `(limit, offset)` for a general list.
    pub(crate) fn page(&self, limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
        let limit = limit
            .unwrap_or(self.limits.default_limit)
            .clamp(1, MAX_PAGE_SIZE);
        (limit, offset.unwrap_or(0))
    }

    /// Resolve `(limit, offset)` for an activity page.
    pub(crate) fn activity_page(&self, limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
        let cap = self.limits.activity_limit.max(1);
        (limit.unwrap_or(cap).clamp(1, cap), offset.unwrap_or(0))
    }

    /// Hand committed activity to the sink, if one is attached.
    pub(crate) fn publish(&self, activities: &[AuditRunActivity]) {
        if let Some(sink) = &self.sink {
            for activity in activities {
                sink.publish(activity);
            }
        }
    }

    /// Whether `identity` may perform `verb` on `resource` inside `org_id`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the membership lookup fails.
    pub async fn check_permission(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        resource: Resource,
        verb: Verb,
    ) -> Result<bool, DatabaseError> {
        if identity.is_super_admin() {
            return Ok(true);
        }
        let membership = {
            let _read = self.db.read().await;
            self.membership_role(&identity.user_id, org_id).await?
        };
        Ok(vigil_auth::check_permission(
            identity, membership, resource, verb,
        ))
    }

    /// Fail unless `identity` may perform `verb` on `resource` inside `org_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty organization id,
    /// `AuthError::InsufficientPermissions` when the check denies, or a
    /// database error.
    pub async fn require_permission(
        &self,
        identity: &AuthIdentity,
        org_id: &str,
        resource: Resource,
        verb: Verb,
    ) -> Result<(), ServiceError> {
        if org_id.trim().is_empty() {
            return Err(ServiceError::validation("organizationId is required"));
        }
        let membership: Option<OrgRole> = if identity.is_super_admin() {
            None
        } else {
            let _read = self.db.read().await;
            self.membership_role(&identity.user_id, org_id).await?
        };
        vigil_auth::require_permission(identity, membership, resource, verb)
            .map_err(ServiceError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, RecordingSink};
    use pretty_assertions::assert_eq;
    use vigil_auth::AuthError;

    #[tokio::test]
    async fn page_applies_default_and_clamps() {
        let svc = VigilService::new_local(":memory:").await.unwrap();
        assert_eq!(svc.page(None, None), (20, 0));
        assert_eq!(svc.page(Some(0), Some(5)), (1, 5));
        assert_eq!(svc.page(Some(10_000), None), (MAX_PAGE_SIZE, 0));
    }

    #[tokio::test]
    async fn activity_page_is_capped() {
        let svc = VigilService::new_local(":memory:").await.unwrap();
        assert_eq!(svc.activity_page(None, None), (50, 0));
        assert_eq!(svc.activity_page(Some(500), Some(10)), (50, 10));
        assert_eq!(svc.activity_page(Some(7), None), (7, 0));
    }

    #[tokio::test]
    async fn require_permission_rejects_missing_org() {
        let fx = Fixture::new().await;
        let err = fx
            .svc
            .require_permission(&fx.manager, "  ", Resource::AuditRun, Verb::Read)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(vigil_core::errors::CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn require_permission_uses_membership() {
        let fx = Fixture::new().await;
        fx.svc
            .require_permission(&fx.manager, &fx.org_id, Resource::AuditRun, Verb::Lock)
            .await
            .unwrap();

        let err = fx
            .svc
            .require_permission(&fx.viewer, &fx.org_id, Resource::AuditRun, Verb::Update)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Auth(AuthError::InsufficientPermissions)
        ));

        assert!(
            !fx.svc
                .check_permission(&fx.outsider, &fx.org_id, Resource::AuditRun, Verb::Read)
                .await
                .unwrap()
        );
        assert!(
            fx.svc
                .check_permission(&fx.root, &fx.org_id, Resource::AuditRun, Verb::Delete)
                .await
                .unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_reads_never_see_rolled_back_rows() {
        let fx = Arc::new(Fixture::new().await);
        let run = fx.create_run("FY26").await;

        let guard = fx.svc.db().begin_write().await.unwrap();
        fx.svc
            .db()
            .conn()
            .execute(
                "INSERT INTO audit_controls (id, audit_run_id, control_id) VALUES ('arc-tx', ?1, ?2)",
                [run.id.as_str(), fx.control_ids[0].as_str()],
            )
            .await
            .unwrap();

        let reader = {
            let fx = Arc::clone(&fx);
            let run_id = run.id.clone();
            tokio::spawn(async move {
                fx.svc
                    .get_audit_run(&fx.viewer, &fx.org_id, &run_id)
                    .await
                    .unwrap()
                    .controls
                    .len()
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        let rolled_back: Result<(), ServiceError> = fx
            .svc
            .db()
            .finish_write(Err(ServiceError::validation("batch rejected")))
            .await;
        assert!(rolled_back.is_err());
        drop(guard);

        assert_eq!(reader.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn publish_reaches_attached_sink() {
        let sink = Arc::new(RecordingSink::default());
        let fx = Fixture::with_sink(sink.clone()).await;
        let run = fx.create_run("FY26").await;
        let published = sink.activity_types();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0], vigil_core::enums::ActivityType::RunCreated);
        assert_eq!(sink.entries()[0].target_entity_id, run.id);
    }
}
