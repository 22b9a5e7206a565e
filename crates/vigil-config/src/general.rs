//! General application configuration.

use serde::{Deserialize, Serialize};

/// Default result limit for list endpoints.
const fn default_limit() -> u32 {
    20
}

/// Maximum number of activity entries returned per page.
const fn default_activity_limit() -> u32 {
    50
}

/// Buffered activity events per broadcast subscriber before it lags.
const fn default_broadcast_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Default result limit for list endpoints.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Page cap for activity log reads.
    #[serde(default = "default_activity_limit")]
    pub activity_limit: u32,

    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            activity_limit: default_activity_limit(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = GeneralConfig::default();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.activity_limit, 50);
        assert_eq!(config.broadcast_capacity, 256);
    }
}
