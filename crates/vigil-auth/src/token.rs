//! Opaque session tokens.
//!
//! Tokens are 32 random bytes, URL-safe base64 without padding. Only the
//! SHA-256 hex digest is ever persisted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::AuthError;

const TOKEN_BYTES: usize = 32;

/// Mint a fresh session token.
///
/// # Errors
///
/// Returns `AuthError::TokenGeneration` if the OS random source fails.
pub fn generate_token() -> Result<String, AuthError> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut buf).map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Hash a token for storage and lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{digest:x}")
}

/// Extract the token from an `Authorization` header value (`Bearer <token>`).
#[must_use]
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Extract a named cookie from a `Cookie` header value.
#[must_use]
pub fn parse_cookie<'a>(header_value: &'a str, name: &str) -> Option<&'a str> {
    header_value
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
