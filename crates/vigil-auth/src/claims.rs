use chrono::{DateTime, Utc};
use vigil_core::enums::UserRole;
use vigil_core::identity::AuthIdentity;

/// Claims carried by a resolved session.
///
/// Produced by the session lookup in `vigil-db`, converted into an
/// [`AuthIdentity`] for every service call.
#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Convert to the lightweight identity passed into service operations.
    #[must_use]
    pub fn to_identity(&self) -> AuthIdentity {
        AuthIdentity {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_claims(expires_at: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            user_id: "usr-1122334455667788".into(),
            email: "auditor@example.com".into(),
            role: UserRole::User,
            expires_at,
        }
    }

    #[test]
    fn to_identity_maps_all_fields() {
        let claims = make_claims(Utc::now() + chrono::TimeDelta::hours(1));
        let identity = claims.to_identity();
        assert_eq!(identity.user_id, "usr-1122334455667788");
        assert_eq!(identity.email, "auditor@example.com");
        assert_eq!(identity.role, UserRole::User);
        assert!(!identity.is_super_admin());
    }

    #[test]
    fn is_expired_false_when_future() {
        let claims = make_claims(Utc::now() + chrono::TimeDelta::hours(1));
        assert!(!claims.is_expired());
    }

    #[test]
    fn is_expired_true_when_past() {
        let claims = make_claims(Utc::now() - chrono::TimeDelta::seconds(1));
        assert!(claims.is_expired());
    }
}
