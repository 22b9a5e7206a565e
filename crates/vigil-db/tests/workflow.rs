//! End-to-end audit workflow against a file-backed database.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use vigil_core::entities::User;
use vigil_core::enums::{
    ActivityType, AuditRunStatus, FindingSeverity, FindingStatus, OrgRole, TaskPriority, UserRole,
};
use vigil_core::identity::AuthIdentity;
use vigil_db::error::ServiceError;
use vigil_db::queries::{ActivityQuery, TaskQuery};
use vigil_db::repos::audit_control::AddControls;
use vigil_db::repos::audit_run::NewAuditRun;
use vigil_db::repos::catalog::NewControl;
use vigil_db::repos::finding::NewFinding;
use vigil_db::service::VigilService;
use vigil_db::updates::audit_run::AuditRunUpdateBuilder;

fn identity(user: &User) -> AuthIdentity {
    AuthIdentity {
        user_id: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

struct World {
    _dir: TempDir,
    svc: VigilService,
    org_id: String,
    framework_id: String,
    controls: Vec<String>,
    manager: AuthIdentity,
    auditor: AuthIdentity,
}

async fn world() -> World {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vigil.db");
    let svc = VigilService::new_local(path.to_str().unwrap()).await.unwrap();

    let org = svc.create_organization("Acme", "acme").await.unwrap();
    let manager = svc
        .create_user("manager@acme.test", Some("Morgan"), UserRole::User)
        .await
        .unwrap();
    let officer = svc
        .create_user("officer@acme.test", None, UserRole::User)
        .await
        .unwrap();
    let auditor = svc
        .create_user("auditor@acme.test", None, UserRole::User)
        .await
        .unwrap();
    svc.add_member(&org.id, &manager.id, OrgRole::AuditManager)
        .await
        .unwrap();
    svc.add_member(&org.id, &officer.id, OrgRole::ComplianceOfficer)
        .await
        .unwrap();
    svc.add_member(&org.id, &auditor.id, OrgRole::Auditor)
        .await
        .unwrap();

    let officer = identity(&officer);
    let framework = svc
        .create_framework(&officer, &org.id, "SOC 2", None)
        .await
        .unwrap();
    let mut controls = Vec::new();
    for code in ["CC6.1", "CC6.2"] {
        let control = svc
            .create_control(
                &officer,
                NewControl {
                    organization_id: org.id.clone(),
                    framework_id: framework.id.clone(),
                    code: code.into(),
                    title: format!("Control {code}"),
                    description: None,
                },
            )
            .await
            .unwrap();
        controls.push(control.id);
    }

    World {
        _dir: dir,
        svc,
        org_id: org.id,
        framework_id: framework.id,
        controls,
        manager: identity(&manager),
        auditor: identity(&auditor),
    }
}

async fn create_run(w: &World) -> String {
    w.svc
        .create_audit_run(
            &w.manager,
            NewAuditRun {
                organization_id: w.org_id.clone(),
                framework_id: w.framework_id.clone(),
                name: "FY26 SOC 2".into(),
                description: None,
                status: None,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn add_two_controls_then_lock_then_update_is_rejected() {
    let w = world().await;
    let run_id = create_run(&w).await;

    let added = w
        .svc
        .add_controls(
            &w.manager,
            &w.org_id,
            &run_id,
            AddControls {
                control_ids: w.controls.clone(),
                ..AddControls::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(added.added.len(), 2);
    assert_eq!(added.tasks.len(), 2);

    let page = w
        .svc
        .list_activity(&w.manager, &w.org_id, &run_id, &ActivityQuery::default())
        .await
        .unwrap();
    let batch = &page.entries[0];
    assert_eq!(batch.activity_type, ActivityType::ControlsAdded);
    assert_eq!(batch.new_value.as_ref().unwrap()["count"], 2);
    assert_eq!(batch.performed_by, w.manager.user_id);

    w.svc
        .lock_audit_run(&w.manager, &w.org_id, &run_id)
        .await
        .unwrap();

    let err = w
        .svc
        .update_audit_run(
            &w.manager,
            &w.org_id,
            &run_id,
            AuditRunUpdateBuilder::new()
                .status(AuditRunStatus::Active)
                .build(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Locked { .. }));
    assert!(err.to_string().contains("locked"));

    let detail = w
        .svc
        .get_audit_run(&w.auditor, &w.org_id, &run_id)
        .await
        .unwrap();
    assert_eq!(detail.audit_run.status, AuditRunStatus::Locked);
    assert_eq!(detail.activity.len(), 3);
}

#[tokio::test]
async fn critical_finding_with_owner_yields_one_high_task() {
    let w = world().await;
    let run_id = create_run(&w).await;

    let response = w
        .svc
        .create_finding(
            &w.auditor,
            NewFinding {
                organization_id: w.org_id.clone(),
                audit_run_id: run_id.clone(),
                severity: FindingSeverity::Critical,
                title: "Shared root credentials".into(),
                description: "The production root account is shared by three engineers.".into(),
                control_id: Some(w.controls[0].clone()),
                audit_control_id: None,
                owner_id: Some(w.manager.user_id.clone()),
                due_date: None,
                remediation_plan: Some("Issue individual break-glass accounts.".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.finding.status, FindingStatus::Open);

    let tasks = w
        .svc
        .list_tasks(
            &w.auditor,
            &w.org_id,
            &TaskQuery {
                finding_id: Some(response.finding.id.clone()),
                ..TaskQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].priority, TaskPriority::High);
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vigil.db");
    let path = path.to_str().unwrap();

    let user_id = {
        let svc = VigilService::new_local(path).await.unwrap();
        svc.create_user("persist@acme.test", None, UserRole::SuperAdmin)
            .await
            .unwrap()
            .id
    };

    let svc = VigilService::new_local(path).await.unwrap();
    let user = svc.get_user(&user_id).await.unwrap();
    assert_eq!(user.email, "persist@acme.test");
}
