//! Shared test utilities for vigil-db unit tests.
//!
//! [`Fixture`] seeds one organization with a member for every role, one
//! outsider, one super admin, a framework, and three controls.

use std::sync::{Arc, Mutex};

use vigil_core::entities::{AuditRun, AuditRunActivity, User};
use vigil_core::enums::{ActivityType, FindingSeverity, OrgRole, UserRole};
use vigil_core::identity::AuthIdentity;
use vigil_core::responses::AddControlsResponse;

use crate::repos::audit_control::AddControls;
use crate::repos::audit_run::NewAuditRun;
use crate::repos::catalog::NewControl;
use crate::repos::finding::NewFinding;
use crate::service::{ActivitySink, VigilService};

pub(crate) fn identity(user: &User) -> AuthIdentity {
    AuthIdentity {
        user_id: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

/// Sink that keeps every published entry in memory.
#[derive(Default)]
pub(crate) struct RecordingSink {
    entries: Mutex<Vec<AuditRunActivity>>,
}

impl RecordingSink {
    pub(crate) fn entries(&self) -> Vec<AuditRunActivity> {
        self.entries.lock().unwrap().clone()
    }

    pub(crate) fn activity_types(&self) -> Vec<ActivityType> {
        self.entries().iter().map(|a| a.activity_type).collect()
    }
}

impl ActivitySink for RecordingSink {
    fn publish(&self, activity: &AuditRunActivity) {
        self.entries.lock().unwrap().push(activity.clone());
    }
}

pub(crate) struct Fixture {
    pub svc: VigilService,
    pub org_id: String,
    pub framework_id: String,
    pub control_ids: Vec<String>,
    pub root: AuthIdentity,
    pub manager: AuthIdentity,
    pub officer: AuthIdentity,
    pub auditor: AuthIdentity,
    pub contributor: AuthIdentity,
    pub viewer: AuthIdentity,
    pub outsider: AuthIdentity,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let svc = VigilService::new_local(":memory:").await.unwrap();
        Self::seed(svc).await
    }

    pub(crate) async fn with_sink(sink: Arc<dyn ActivitySink>) -> Self {
        let svc = VigilService::new_local(":memory:")
            .await
            .unwrap()
            .with_activity_sink(sink);
        Self::seed(svc).await
    }

    async fn seed(svc: VigilService) -> Self {
        let org = svc.create_organization("Acme", "acme").await.unwrap();

        let root = svc
            .create_user("root@acme.test", Some("Root"), UserRole::SuperAdmin)
            .await
            .unwrap();
        let outsider = svc
            .create_user("outsider@globex.test", None, UserRole::User)
            .await
            .unwrap();

        let mut members = Vec::new();
        for (email, role) in [
            ("manager@acme.test", OrgRole::AuditManager),
            ("officer@acme.test", OrgRole::ComplianceOfficer),
            ("auditor@acme.test", OrgRole::Auditor),
            ("contributor@acme.test", OrgRole::Contributor),
            ("viewer@acme.test", OrgRole::Viewer),
        ] {
            let user = svc.create_user(email, None, UserRole::User).await.unwrap();
            svc.add_member(&org.id, &user.id, role).await.unwrap();
            members.push(identity(&user));
        }
        let [manager, officer, auditor, contributor, viewer]: [AuthIdentity; 5] =
            members.try_into().unwrap();

        let framework = svc
            .create_framework(&officer, &org.id, "SOC 2", Some("2017"))
            .await
            .unwrap();
        let mut control_ids = Vec::new();
        for (code, title) in [
            ("CC1.1", "Integrity and ethical values"),
            ("CC6.1", "Logical access security"),
            ("CC7.2", "System monitoring"),
        ] {
            let control = svc
                .create_control(
                    &officer,
                    NewControl {
                        organization_id: org.id.clone(),
                        framework_id: framework.id.clone(),
                        code: code.into(),
                        title: title.into(),
                        description: None,
                    },
                )
                .await
                .unwrap();
            control_ids.push(control.id);
        }

        Self {
            svc,
            org_id: org.id,
            framework_id: framework.id,
            control_ids,
            root: identity(&root),
            manager,
            officer,
            auditor,
            contributor,
            viewer,
            outsider: identity(&outsider),
        }
    }

    pub(crate) fn new_run(&self, name: &str) -> NewAuditRun {
        NewAuditRun {
            organization_id: self.org_id.clone(),
            framework_id: self.framework_id.clone(),
            name: name.into(),
            description: None,
            status: None,
            start_date: None,
            end_date: None,
        }
    }

    /// Create a run as the audit manager.
    pub(crate) async fn create_run(&self, name: &str) -> AuditRun {
        self.svc
            .create_audit_run(&self.manager, self.new_run(name))
            .await
            .unwrap()
    }

    /// Attach the first `n` seeded controls as the audit manager.
    pub(crate) async fn attach_controls(&self, run_id: &str, n: usize) -> AddControlsResponse {
        self.svc
            .add_controls(
                &self.manager,
                &self.org_id,
                run_id,
                AddControls {
                    control_ids: self.control_ids[..n].to_vec(),
                    ..AddControls::default()
                },
            )
            .await
            .unwrap()
    }

    pub(crate) fn new_finding(&self, run_id: &str, severity: FindingSeverity) -> NewFinding {
        NewFinding {
            organization_id: self.org_id.clone(),
            audit_run_id: run_id.into(),
            severity,
            title: "MFA not enforced for admins".into(),
            description: "Two admin accounts sign in with password only.".into(),
            control_id: None,
            audit_control_id: None,
            owner_id: None,
            due_date: None,
            remediation_plan: None,
        }
    }

    pub(crate) async fn activity_count(&self, run_id: &str) -> i64 {
        let mut rows = self
            .svc
            .db()
            .conn()
            .query(
                "SELECT COUNT(*) FROM audit_run_activities WHERE audit_run_id = ?1",
                [run_id],
            )
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    pub(crate) async fn count(&self, table: &str) -> i64 {
        let mut rows = self
            .svc
            .db()
            .conn()
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }
}
