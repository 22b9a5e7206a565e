//! Session tokens: issue, resolve, revoke.
//!
//! Only the SHA-256 of a token is stored. Resolving a token yields the
//! [`SessionClaims`] the server turns into an `AuthIdentity`.

use chrono::{TimeDelta, Utc};

use vigil_auth::token::{generate_token, hash_token};
use vigil_auth::{AuthError, SessionClaims};

use crate::error::{DatabaseError, ServiceError};
use crate::helpers::RowExt;
use crate::service::VigilService;

impl VigilService {
    /// Mint a session for `user_id` valid for `ttl`. Returns the raw token,
    /// which is never stored.
    pub async fn issue_session(&self, user_id: &str, ttl: TimeDelta) -> Result<String, ServiceError> {
        if ttl <= TimeDelta::zero() {
            return Err(ServiceError::validation("session ttl must be positive"));
        }
        self.get_user(user_id).await?;

        let token = generate_token()?;
        let expires_at = Utc::now() + ttl;

        let guard = self.db().begin_write().await?;
        let result: Result<u64, DatabaseError> = self
            .db()
            .conn()
            .execute(
                "INSERT INTO auth_sessions (token_hash, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                libsql::params![
                    hash_token(&token),
                    user_id,
                    expires_at.to_rfc3339(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(DatabaseError::from);
        self.db().finish_write(result).await?;
        drop(guard);

        tracing::info!(user_id, %expires_at, "session issued");
        Ok(token)
    }

    /// Look up the session behind `token`.
    ///
    /// # Errors
    ///
    /// `AuthError::NotAuthenticated` for unknown tokens,
    /// `AuthError::SessionExpired` for expired ones.
    pub async fn resolve_session(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        let _read = self.db().read().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT u.id, u.email, u.role, s.expires_at
                 FROM auth_sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1",
                [hash_token(token)],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Err(AuthError::NotAuthenticated.into());
        };

        let claims = SessionClaims {
            user_id: row.get(0)?,
            email: row.get(1)?,
            role: row.enum_value(2)?,
            expires_at: row.timestamp(3)?,
        };
        if claims.is_expired() {
            tracing::debug!(user_id = %claims.user_id, "rejected expired session");
            return Err(AuthError::SessionExpired.into());
        }
        Ok(claims)
    }

    /// Delete the session behind `token`. Returns whether one existed.
    pub async fn revoke_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let guard = self.db().begin_write().await?;
        let result = self
            .db()
            .conn()
            .execute(
                "DELETE FROM auth_sessions WHERE token_hash = ?1",
                [hash_token(token)],
            )
            .await
            .map_err(DatabaseError::from);
        let deleted = self.db().finish_write(result).await?;
        drop(guard);
        Ok(deleted > 0)
    }

    /// Remove every expired session. Returns how many were removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, DatabaseError> {
        let guard = self.db().begin_write().await?;
        let result = self
            .db()
            .conn()
            .execute(
                "DELETE FROM auth_sessions WHERE expires_at <= ?1",
                [Utc::now().to_rfc3339()],
            )
            .await
            .map_err(DatabaseError::from);
        let purged = self.db().finish_write(result).await?;
        drop(guard);
        if purged > 0 {
            tracing::info!(purged, "expired sessions purged");
        }
        Ok(purged)
    }
}
