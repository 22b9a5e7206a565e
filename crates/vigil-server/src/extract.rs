//! Caller authentication for handlers.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use vigil_core::identity::AuthIdentity;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, resolved from `Authorization: Bearer <token>` or,
/// failing that, the session cookie.
#[derive(Debug, Clone)]
pub struct Caller(pub AuthIdentity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts, &state.cookie_name))
            .ok_or(ApiError::Unauthorized)?;
        let claims = state.svc.resolve_session(&token).await?;
        Ok(Self(claims.to_identity()))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header_is_read() {
        let p = parts(&[("authorization", "Bearer abc123")]);
        assert_eq!(bearer_token(&p).as_deref(), Some("abc123"));
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        let p = parts(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(bearer_token(&p), None);
        let p = parts(&[("authorization", "Bearer ")]);
        assert_eq!(bearer_token(&p), None);
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let p = parts(&[("cookie", "theme=dark; vigil_session=tok-1; lang=en")]);
        assert_eq!(cookie_token(&p, "vigil_session").as_deref(), Some("tok-1"));
        assert_eq!(cookie_token(&p, "other"), None);
    }
}
