//! Typed column access on `libsql::Row`.
//!
//! Timestamps are written with `to_rfc3339()` but `SQLite` defaults produce
//! `YYYY-MM-DD HH:MM:SS`; both are accepted on read. Empty strings read back
//! as `None` for optional columns.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::DatabaseError;

/// Column readers used by every repo's `row_to_*` function.
pub trait RowExt {
    fn opt_text(&self, idx: i32) -> Result<Option<String>, DatabaseError>;
    fn timestamp(&self, idx: i32) -> Result<DateTime<Utc>, DatabaseError>;
    fn opt_timestamp(&self, idx: i32) -> Result<Option<DateTime<Utc>>, DatabaseError>;
    /// Read a `SCREAMING_SNAKE_CASE` enum column.
    fn enum_value<T: DeserializeOwned>(&self, idx: i32) -> Result<T, DatabaseError>;
    fn opt_json(&self, idx: i32) -> Result<Option<serde_json::Value>, DatabaseError>;
}

impl RowExt for libsql::Row {
    fn opt_text(&self, idx: i32) -> Result<Option<String>, DatabaseError> {
        Ok(self.get::<Option<String>>(idx)?.filter(|s| !s.is_empty()))
    }

    fn timestamp(&self, idx: i32) -> Result<DateTime<Utc>, DatabaseError> {
        parse_timestamp(&self.get::<String>(idx)?)
    }

    fn opt_timestamp(&self, idx: i32) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        self.opt_text(idx)?.as_deref().map(parse_timestamp).transpose()
    }

    fn enum_value<T: DeserializeOwned>(&self, idx: i32) -> Result<T, DatabaseError> {
        parse_stored_enum(&self.get::<String>(idx)?)
    }

    fn opt_json(&self, idx: i32) -> Result<Option<serde_json::Value>, DatabaseError> {
        self.opt_text(idx)?
            .map(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Query(format!("column {idx} holds invalid JSON: {e}")))
            })
            .transpose()
    }
}

/// # Errors
///
/// Returns `DatabaseError::Query` if `s` is neither RFC 3339 nor `SQLite`'s
/// `datetime('now')` format.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
        .map_err(|e| DatabaseError::Query(format!("bad timestamp '{s}': {e}")))
}

/// # Errors
///
/// Returns `DatabaseError::Query` if `s` names no variant of `T`.
pub fn parse_stored_enum<T: DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_owned()))
        .map_err(|e| DatabaseError::Query(format!("unknown stored value '{s}': {e}")))
}

/// Bind form for a nullable timestamp parameter.
#[must_use]
pub fn opt_rfc3339(dt: Option<&DateTime<Utc>>) -> Option<String> {
    dt.map(DateTime::to_rfc3339)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vigil_core::enums::{AuditRunStatus, FindingSeverity};

    use super::*;
    use crate::VigilDb;

    #[test]
    fn accepts_both_timestamp_formats() {
        let a = parse_timestamp("2026-02-09T14:30:00+00:00").unwrap();
        let b = parse_timestamp("2026-02-09 14:30:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn stored_enums_are_case_sensitive() {
        let status: AuditRunStatus = parse_stored_enum("IN_REVIEW").unwrap();
        assert_eq!(status, AuditRunStatus::InReview);
        let severity: FindingSeverity = parse_stored_enum("CRITICAL").unwrap();
        assert_eq!(severity, FindingSeverity::Critical);
        assert!(parse_stored_enum::<AuditRunStatus>("in_review").is_err());
    }

    #[tokio::test]
    async fn row_readers_handle_null_and_empty() {
        let db = VigilDb::open_local(":memory:").await.unwrap();
        let mut rows = db
            .conn()
            .query(
                "SELECT NULL, '', '2026-02-09 14:30:00', 'LOCKED', '{\"count\":2}', '{oops'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();

        assert_eq!(row.opt_text(0).unwrap(), None);
        assert_eq!(row.opt_text(1).unwrap(), None);
        assert_eq!(row.opt_timestamp(1).unwrap(), None);
        assert!(row.opt_timestamp(2).unwrap().is_some());
        assert_eq!(
            row.enum_value::<AuditRunStatus>(3).unwrap(),
            AuditRunStatus::Locked
        );
        assert_eq!(row.opt_json(4).unwrap().unwrap()["count"], 2);
        assert!(row.opt_json(5).is_err());
    }
}
