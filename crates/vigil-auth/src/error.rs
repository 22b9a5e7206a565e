use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    /// Caller is authenticated but lacks the organization role for the action.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("token generation failed: {0}")]
    TokenGeneration(String),
}
