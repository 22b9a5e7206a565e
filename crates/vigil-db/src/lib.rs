//! # vigil-db
//!
//! libSQL persistence and the audit-run workflow service for Vigil.
//!
//! Handles all relational state: users, organizations and memberships,
//! session tokens, the framework/control catalog, audit runs, audit controls,
//! findings, tasks, and the append-only activity log.
//!
//! [`service::VigilService`] is the entry point. Every operation takes the
//! caller's [`vigil_core::identity::AuthIdentity`] explicitly, checks
//! organization permissions, and records activity for every state change.

pub mod error;
pub mod helpers;
mod migrations;
pub mod queries;
pub mod repos;
pub mod service;
pub mod updates;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::Builder;
use tokio::sync::{Mutex, MutexGuard};

/// Central database handle.
///
/// Wraps a libSQL database, one shared connection, and the lock that owns
/// it. Writers hold the lock for their whole transaction and readers hold it
/// for their queries, so a read never observes another request's open
/// transaction.
pub struct VigilDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    lock: Mutex<()>,
}

impl VigilDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Foreign keys must be enabled per connection in SQLite
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let vigil_db = Self {
            db,
            conn,
            lock: Mutex::new(()),
        };
        vigil_db.run_migrations().await?;
        Ok(vigil_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g. `"run-3fa8b2c19e0d4471"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT ?1 || '-' || lower(hex(randomblob(8)))", [prefix])
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }

    /// Take the connection lock for a read.
    ///
    /// Waits for any open transaction to commit or roll back. Never call this
    /// while holding the guard from [`Self::begin_write`].
    pub async fn read(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Take the connection lock and open a transaction.
    ///
    /// Hold the returned guard until [`Self::finish_write`] has run.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if `BEGIN` fails.
    pub async fn begin_write(&self) -> Result<MutexGuard<'_, ()>, DatabaseError> {
        let guard = self.lock.lock().await;
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(guard)
    }

    /// Commit if `result` is `Ok`, roll back otherwise, and pass `result` through.
    ///
    /// # Errors
    ///
    /// Returns the original error, or the `COMMIT` failure.
    pub async fn finish_write<T, E>(&self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DatabaseError>,
    {
        match result {
            Ok(value) => {
                self.conn
                    .execute("COMMIT", ())
                    .await
                    .map_err(|e| E::from(DatabaseError::LibSql(e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute("ROLLBACK", ()).await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    async fn test_db() -> VigilDb {
        VigilDb::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;

        let tables = [
            "users",
            "organizations",
            "org_memberships",
            "auth_sessions",
            "frameworks",
            "controls",
            "audit_runs",
            "audit_controls",
            "audit_findings",
            "tasks",
            "audit_run_activities",
        ];
        for table in &tables {
            let mut rows = db
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn generate_id_correct_format() {
        let db = test_db().await;
        let id = db.generate_id("run").await.unwrap();
        assert!(id.starts_with("run-"), "ID should start with 'run-': {id}");
        assert_eq!(id.len(), 20, "3 prefix + 1 dash + 16 hex: {id}");
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn generate_id_all_prefixes() {
        let db = test_db().await;
        for prefix in vigil_core::ids::ALL_PREFIXES {
            let id = db.generate_id(prefix).await.unwrap();
            assert!(id.starts_with(&format!("{prefix}-")));
        }
    }

    #[tokio::test]
    async fn generate_id_uniqueness() {
        let db = test_db().await;
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let id = db.generate_id("tst").await.unwrap();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {id}");
        }
    }

    #[tokio::test]
    async fn idempotent_migrations() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn activity_rows_are_append_only() {
        let db = test_db().await;
        db.conn()
            .execute(
                "INSERT INTO audit_run_activities
                 (id, organization_id, audit_run_id, activity_type, performed_by, target_entity_type, target_entity_id, created_at)
                 VALUES ('act-1', 'org-1', 'run-1', 'RUN_CREATED', 'usr-1', 'AUDIT_RUN', 'run-1', '2026-01-01T00:00:00+00:00')",
                (),
            )
            .await
            .unwrap();

        let update = db
            .conn()
            .execute(
                "UPDATE audit_run_activities SET performed_by = 'usr-2' WHERE id = 'act-1'",
                (),
            )
            .await;
        assert!(update.is_err(), "UPDATE on activity should be rejected");

        let delete = db
            .conn()
            .execute("DELETE FROM audit_run_activities WHERE id = 'act-1'", ())
            .await;
        assert!(delete.is_err(), "DELETE on activity should be rejected");
    }

    #[tokio::test]
    async fn finish_write_rolls_back_on_error() {
        let db = test_db().await;
        let guard = db.begin_write().await.unwrap();
        db.conn()
            .execute(
                "INSERT INTO users (id, email) VALUES ('usr-rb', 'rb@example.com')",
                (),
            )
            .await
            .unwrap();
        let result: Result<(), DatabaseError> = db
            .finish_write(Err(DatabaseError::Query("boom".into())))
            .await;
        drop(guard);
        assert!(result.is_err());

        let mut rows = db
            .conn()
            .query("SELECT COUNT(*) FROM users WHERE id = 'usr-rb'", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn read_waits_for_open_transaction() {
        let db = Arc::new(test_db().await);
        let guard = db.begin_write().await.unwrap();
        db.conn()
            .execute(
                "INSERT INTO users (id, email) VALUES ('usr-tx', 'tx@example.com')",
                (),
            )
            .await
            .unwrap();

        let reader = {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                let _read = db.read().await;
                let mut rows = db
                    .conn()
                    .query("SELECT COUNT(*) FROM users WHERE id = 'usr-tx'", ())
                    .await
                    .unwrap();
                rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished(), "read must wait for the transaction");

        let result: Result<(), DatabaseError> = db
            .finish_write(Err(DatabaseError::Query("abort".into())))
            .await;
        assert!(result.is_err());
        drop(guard);

        assert_eq!(reader.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn audit_controls_unique_per_run_and_control() {
        let db = test_db().await;
        db.conn()
            .execute_batch(
                "INSERT INTO users (id, email) VALUES ('usr-1', 'a@example.com');
                 INSERT INTO organizations (id, name, slug) VALUES ('org-1', 'Acme', 'acme');
                 INSERT INTO frameworks (id, organization_id, name) VALUES ('fwk-1', 'org-1', 'SOC 2');
                 INSERT INTO controls (id, organization_id, framework_id, code, title) VALUES ('ctl-1', 'org-1', 'fwk-1', 'CC1.1', 'Integrity');
                 INSERT INTO audit_runs (id, organization_id, framework_id, name, creator_id) VALUES ('run-1', 'org-1', 'fwk-1', 'FY26', 'usr-1');
                 INSERT INTO audit_controls (id, audit_run_id, control_id) VALUES ('arc-1', 'run-1', 'ctl-1');",
            )
            .await
            .unwrap();

        let duplicate = db
            .conn()
            .execute(
                "INSERT INTO audit_controls (id, audit_run_id, control_id) VALUES ('arc-2', 'run-1', 'ctl-1')",
                (),
            )
            .await;
        assert!(duplicate.is_err(), "duplicate (run, control) should be rejected");
    }
}
