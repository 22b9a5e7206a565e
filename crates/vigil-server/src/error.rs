//! HTTP error mapping.
//!
//! Every handler returns `Result<_, ApiError>`. The response body is always
//! `{"error": "<message>"}`; unexpected failures are logged with their full
//! chain and answered with a generic message.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use vigil_auth::AuthError;
use vigil_core::errors::CoreError;
use vigil_db::error::ServiceError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a service error raised by a `DELETE`, where a locked run is a
    /// bad request rather than forbidden.
    #[must_use]
    pub fn for_delete(error: ServiceError) -> Self {
        match error {
            ServiceError::Locked { .. } => Self::BadRequest(error.to_string()),
            other => other.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Auth(AuthError::NotAuthenticated | AuthError::SessionExpired) => {
                Self::Unauthorized
            }
            ServiceError::Auth(AuthError::InsufficientPermissions) => {
                Self::Forbidden(AuthError::InsufficientPermissions.to_string())
            }
            ServiceError::Locked { .. } => Self::Forbidden(error.to_string()),
            ServiceError::Core(CoreError::NotFound { entity_type, .. }) => {
                Self::NotFound(format!("{entity_type} not found"))
            }
            ServiceError::Core(CoreError::Validation(message)) => Self::BadRequest(message),
            ServiceError::Auth(other @ AuthError::TokenGeneration(_)) => {
                Self::Internal(other.into())
            }
            ServiceError::Core(CoreError::Other(e)) => Self::Internal(e),
            ServiceError::Database(e) => Self::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                "Internal server error".to_string()
            }
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::BadRequest(m) | Self::Forbidden(m) | Self::NotFound(m) => m,
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vigil_db::error::DatabaseError;

    use super::*;

    #[test]
    fn service_errors_map_to_statuses() {
        let cases = [
            (
                ServiceError::Auth(AuthError::NotAuthenticated),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ServiceError::Auth(AuthError::SessionExpired),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ServiceError::Auth(AuthError::InsufficientPermissions),
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::Locked {
                    audit_run_id: "run-1".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::not_found("auditRun", "run-1"),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::validation("name is required"),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Database(DatabaseError::NoResult),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
    }

    #[test]
    fn locked_on_delete_is_bad_request() {
        let error = ApiError::for_delete(ServiceError::Locked {
            audit_run_id: "run-1".into(),
        });
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains("locked"));
    }

    #[test]
    fn forbidden_message_is_literal() {
        let error = ApiError::from(ServiceError::Auth(AuthError::InsufficientPermissions));
        assert_eq!(error.to_string(), "Insufficient permissions");
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response =
            ApiError::from(ServiceError::Database(DatabaseError::Query("secret".into())))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
