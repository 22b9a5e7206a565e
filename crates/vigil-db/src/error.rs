//! Error types for vigil-db.
//!
//! `DatabaseError` covers storage failures. `ServiceError` is what every
//! service operation returns: it adds the authorization, not-found,
//! validation, and locked-run outcomes that `vigil-server` maps to HTTP
//! statuses.

use thiserror::Error;
use vigil_auth::AuthError;
use vigil_core::errors::CoreError;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned unparseable data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Not found (including cross-tenant) or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The audit run is locked; it and its children are read-only.
    #[error("Audit run {audit_run_id} is locked")]
    Locked { audit_run_id: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn not_found(entity_type: &str, id: &str) -> Self {
        Self::Core(CoreError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Core(CoreError::Validation(message.into()))
    }
}

impl From<libsql::Error> for ServiceError {
    fn from(e: libsql::Error) -> Self {
        Self::Database(DatabaseError::LibSql(e))
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(e.into())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Database(e.into())
    }
}
