//! Cross-cutting error types for Vigil.
//!
//! Domain-specific errors (`DatabaseError`, `ServiceError`, `AuthError`) live in
//! their respective crates. HTTP status mapping happens in `vigil-server`.

use thiserror::Error;

/// Errors that can be raised by any Vigil crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// Data failed validation (missing field, bad format, constraint).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
