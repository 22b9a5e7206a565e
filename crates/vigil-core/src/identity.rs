use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::UserRole;

/// Authenticated caller identity, passed explicitly into every service operation.
///
/// Produced by `vigil-auth` from a resolved session. Contains only data
/// fields; organization roles are looked up per request by the permission gate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub user_id: String,
    pub email: String,
    /// Global role. `SuperAdmin` bypasses organization permission checks.
    pub role: UserRole,
}

impl AuthIdentity {
    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self.role, UserRole::SuperAdmin)
    }
}
