//! # vigil-auth
//!
//! Session authentication and authorization for Vigil.
//!
//! Provides opaque bearer session tokens (random, stored only as SHA-256
//! hashes), the claims a resolved session yields, and the permission gate that
//! decides whether an identity may perform a verb on a resource inside an
//! organization.
//!
//! Session storage lives in `vigil-db`; this crate holds no I/O.

pub mod claims;
pub mod error;
pub mod permission;
pub mod token;

pub use claims::SessionClaims;
pub use error::AuthError;
pub use permission::{Resource, Verb, check_permission, require_permission};
