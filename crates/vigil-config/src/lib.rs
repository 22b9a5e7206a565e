//! # vigil-config
//!
//! Layered configuration loading for Vigil using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`VIGIL_*` prefix, `__` as separator)
//! 2. Working-directory `vigil.toml`
//! 3. User-level `~/.config/vigil/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `VIGIL_DATABASE__PATH` -> `database.path`,
//! `VIGIL_SERVER__BIND` -> `server.bind`, etc. The `__` (double underscore)
//! separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use vigil_config::VigilConfig;
//!
//! let config = VigilConfig::load_with_dotenv().expect("config");
//! println!("listening on {}", config.server.bind);
//! ```

mod auth;
mod database;
mod error;
mod general;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use server::ServerConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest page any list endpoint will return.
pub const MAX_LIST_LIMIT: u32 = 200;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl VigilConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source fails to parse or a value has
    /// the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Load configuration with an explicit TOML file layered above the default files.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let config: Self = Self::base_figment()
            .merge(Toml::file(path))
            .merge(Self::env_provider())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot work at runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::invalid("database.path", "must not be empty"));
        }
        self.server.socket_addr()?;
        if self.auth.session_ttl_hours <= 0 {
            return Err(ConfigError::invalid(
                "auth.session_ttl_hours",
                "must be positive",
            ));
        }
        if self.auth.cookie_name.trim().is_empty()
            || self
                .auth
                .cookie_name
                .contains(|c: char| c == '=' || c == ';' || c.is_whitespace())
        {
            return Err(ConfigError::invalid(
                "auth.cookie_name",
                "must be a non-empty cookie token",
            ));
        }
        if !(1..=MAX_LIST_LIMIT).contains(&self.general.default_limit) {
            return Err(ConfigError::invalid(
                "general.default_limit",
                format!("must be between 1 and {MAX_LIST_LIMIT}"),
            ));
        }
        if !(1..=MAX_LIST_LIMIT).contains(&self.general.activity_limit) {
            return Err(ConfigError::invalid(
                "general.activity_limit",
                format!("must be between 1 and {MAX_LIST_LIMIT}"),
            ));
        }
        if self.general.broadcast_capacity == 0 {
            return Err(ConfigError::invalid(
                "general.broadcast_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        Self::base_figment().merge(Self::env_provider())
    }

    fn base_figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from("vigil.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment
    }

    fn env_provider() -> Env {
        Env::prefixed("VIGIL_").split("__")
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vigil").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let config = VigilConfig::default();
        assert_eq!(config.database.path, "vigil.db");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.auth.cookie_name, "vigil_session");
        assert_eq!(config.general.activity_limit, 50);
    }

    #[test]
    fn defaults_validate() {
        VigilConfig::default().validate().unwrap();
    }

    #[test]
    fn validation_names_the_bad_field() {
        let mut config = VigilConfig::default();
        config.general.default_limit = 500;
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "general.default_limit");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }

        let mut config = VigilConfig::default();
        config.auth.cookie_name = "bad name".into();
        assert!(config.validate().is_err());

        let mut config = VigilConfig::default();
        config.auth.session_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn figment_builds_without_files() {
        figment::Jail::expect_with(|_jail| {
            let config: VigilConfig = VigilConfig::figment().extract()?;
            assert_eq!(config.general.default_limit, 20);
            assert_eq!(config.auth.session_ttl_hours, 24);
            Ok(())
        });
    }
}
