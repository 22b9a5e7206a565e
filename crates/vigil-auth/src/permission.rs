//! Organization permission gate.
//!
//! A grant is decided from three inputs: the caller's global role, the
//! caller's membership role in the target organization (if any), and the
//! `(resource, verb)` pair being attempted. `SUPER_ADMIN` bypasses every
//! check; everyone else needs a membership whose role is in the allowed set.
//!
//! The gate is pure. Membership lookup is the caller's job.

use vigil_core::enums::OrgRole;
use vigil_core::identity::AuthIdentity;

use crate::AuthError;

/// Something a permission can be granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    AuditRun,
    AuditControl,
    /// Frameworks and controls.
    Catalog,
    Finding,
    Task,
    Activity,
}

/// What the caller wants to do to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Read,
    Create,
    Update,
    Delete,
    Assign,
    Lock,
}

const ALL_ROLES: &[OrgRole] = &[
    OrgRole::Owner,
    OrgRole::Admin,
    OrgRole::AuditManager,
    OrgRole::ComplianceOfficer,
    OrgRole::Auditor,
    OrgRole::Contributor,
    OrgRole::Viewer,
];

const RUN_MANAGERS: &[OrgRole] = &[
    OrgRole::Owner,
    OrgRole::Admin,
    OrgRole::AuditManager,
    OrgRole::ComplianceOfficer,
];

const RUN_OWNERS: &[OrgRole] = &[OrgRole::Owner, OrgRole::Admin, OrgRole::AuditManager];

const CATALOG_EDITORS: &[OrgRole] = &[OrgRole::Owner, OrgRole::Admin, OrgRole::ComplianceOfficer];

const FINDING_EDITORS: &[OrgRole] = &[
    OrgRole::Owner,
    OrgRole::Admin,
    OrgRole::AuditManager,
    OrgRole::ComplianceOfficer,
    OrgRole::Auditor,
];

const TASK_WORKERS: &[OrgRole] = &[
    OrgRole::Owner,
    OrgRole::Admin,
    OrgRole::AuditManager,
    OrgRole::ComplianceOfficer,
    OrgRole::Auditor,
    OrgRole::Contributor,
];

/// Organization roles allowed to perform `verb` on `resource`.
#[must_use]
#[allow(clippy::match_same_arms)]
pub const fn allowed_roles(resource: Resource, verb: Verb) -> &'static [OrgRole] {
    match (resource, verb) {
        (_, Verb::Read) => ALL_ROLES,
        (Resource::AuditRun, Verb::Delete | Verb::Lock) => RUN_OWNERS,
        (Resource::AuditRun | Resource::AuditControl, _) => RUN_MANAGERS,
        (Resource::Catalog, _) => CATALOG_EDITORS,
        (Resource::Finding, Verb::Delete) => RUN_OWNERS,
        (Resource::Finding, _) => FINDING_EDITORS,
        (Resource::Task, _) => TASK_WORKERS,
        // The activity log is append-only; nobody writes to it directly.
        (Resource::Activity, _) => &[],
    }
}

/// Decide whether `identity`, holding `membership` in the target organization,
/// may perform `verb` on `resource`.
#[must_use]
pub fn check_permission(
    identity: &AuthIdentity,
    membership: Option<OrgRole>,
    resource: Resource,
    verb: Verb,
) -> bool {
    if identity.is_super_admin() {
        return true;
    }
    membership.is_some_and(|role| allowed_roles(resource, verb).contains(&role))
}

/// Like [`check_permission`], but fails with `AuthError::InsufficientPermissions`.
///
/// # Errors
///
/// Returns `AuthError::InsufficientPermissions` when the check denies.
pub fn require_permission(
    identity: &AuthIdentity,
    membership: Option<OrgRole>,
    resource: Resource,
    verb: Verb,
) -> Result<(), AuthError> {
    if check_permission(identity, membership, resource, verb) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %identity.user_id,
            ?membership,
            ?resource,
            ?verb,
            "permission denied"
        );
        Err(AuthError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use vigil_core::enums::UserRole;

    fn user() -> AuthIdentity {
        AuthIdentity {
            user_id: "usr-0000000000000001".into(),
            email: "member@example.com".into(),
            role: UserRole::User,
        }
    }

    fn super_admin() -> AuthIdentity {
        AuthIdentity {
            user_id: "usr-0000000000000002".into(),
            email: "root@example.com".into(),
            role: UserRole::SuperAdmin,
        }
    }

    #[test]
    fn super_admin_bypasses_without_membership() {
        assert!(check_permission(
            &super_admin(),
            None,
            Resource::AuditRun,
            Verb::Delete
        ));
    }

    #[test]
    fn non_member_is_denied_even_for_reads() {
        assert!(!check_permission(&user(), None, Resource::AuditRun, Verb::Read));
    }

    #[test]
    fn every_role_can_read() {
        for role in ALL_ROLES {
            assert!(check_permission(
                &user(),
                Some(*role),
                Resource::Finding,
                Verb::Read
            ));
        }
    }

    #[rstest]
    #[case(OrgRole::AuditManager, Resource::AuditRun, Verb::Update, true)]
    #[case(OrgRole::ComplianceOfficer, Resource::AuditRun, Verb::Create, true)]
    #[case(OrgRole::ComplianceOfficer, Resource::AuditRun, Verb::Lock, false)]
    #[case(OrgRole::AuditManager, Resource::AuditRun, Verb::Lock, true)]
    #[case(OrgRole::Auditor, Resource::AuditRun, Verb::Update, false)]
    #[case(OrgRole::Auditor, Resource::Finding, Verb::Create, true)]
    #[case(OrgRole::Auditor, Resource::Finding, Verb::Delete, false)]
    #[case(OrgRole::Contributor, Resource::Finding, Verb::Create, false)]
    #[case(OrgRole::Contributor, Resource::Task, Verb::Update, true)]
    #[case(OrgRole::Viewer, Resource::Task, Verb::Update, false)]
    #[case(OrgRole::AuditManager, Resource::AuditControl, Verb::Assign, true)]
    #[case(OrgRole::AuditManager, Resource::Catalog, Verb::Create, false)]
    #[case(OrgRole::Owner, Resource::Activity, Verb::Update, false)]
    fn role_matrix(
        #[case] role: OrgRole,
        #[case] resource: Resource,
        #[case] verb: Verb,
        #[case] expected: bool,
    ) {
        assert_eq!(
            check_permission(&user(), Some(role), resource, verb),
            expected
        );
    }

    #[test]
    fn require_permission_returns_typed_error() {
        let result = require_permission(
            &user(),
            Some(OrgRole::Viewer),
            Resource::AuditRun,
            Verb::Update,
        );
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
        assert_eq!(
            AuthError::InsufficientPermissions.to_string(),
            "Insufficient permissions"
        );
    }
}
