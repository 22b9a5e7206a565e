//! Versioned schema migrations.
//!
//! Each embedded script runs once; applied versions are recorded in
//! `schema_migrations` so reopening an existing database is a no-op.

use chrono::Utc;

use crate::VigilDb;
use crate::error::DatabaseError;

/// `(version, sql)` in apply order.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../migrations/001_initial.sql"),
)];

impl VigilDb {
    pub(crate) async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version TEXT PRIMARY KEY,
                    applied_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Migration(format!("schema_migrations: {e}")))?;

        for (version, sql) in MIGRATIONS {
            if self.migration_applied(version).await? {
                continue;
            }
            self.conn
                .execute_batch(sql)
                .await
                .map_err(|e| DatabaseError::Migration(format!("{version}: {e}")))?;
            self.conn
                .execute(
                    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                    [*version, Utc::now().to_rfc3339().as_str()],
                )
                .await?;
            tracing::debug!(version, "migration applied");
        }
        Ok(())
    }

    async fn migration_applied(&self, version: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM schema_migrations WHERE version = ?1", [version])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Versions recorded in `schema_migrations`, oldest first.
    pub async fn applied_migrations(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT version FROM schema_migrations ORDER BY version",
                (),
            )
            .await?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next().await? {
            versions.push(row.get::<String>(0)?);
        }
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::VigilDb;

    #[tokio::test]
    async fn migrations_are_recorded_once() {
        let db = VigilDb::open_local(":memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        assert_eq!(db.applied_migrations().await.unwrap(), vec!["001_initial"]);
    }
}
