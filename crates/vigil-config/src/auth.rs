//! Session authentication configuration.

use serde::{Deserialize, Serialize};

const fn default_session_ttl_hours() -> i64 {
    24
}

fn default_cookie_name() -> String {
    "vigil_session".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Lifetime of sessions minted by `vigil session issue`.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Cookie consulted when no `Authorization: Bearer` header is present.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            cookie_name: default_cookie_name(),
        }
    }
}
