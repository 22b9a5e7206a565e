//! Typed list filters, one per listable resource.
//!
//! Every field is optional. `limit`/`offset` are clamped by the service:
//! a missing limit falls back to `general.default_limit`, activity pages are
//! capped at `general.activity_limit`.

use vigil_core::enums::{
    ActivityType, AuditRunStatus, FindingSeverity, FindingStatus, TaskPriority, TaskStatus,
    TaskType,
};

/// Upper bound for any non-activity page.
pub const MAX_PAGE_SIZE: u32 = vigil_config::MAX_LIST_LIMIT;

#[derive(Debug, Clone, Default)]
pub struct AuditRunQuery {
    pub status: Option<AuditRunStatus>,
    pub framework_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct FindingQuery {
    pub audit_run_id: Option<String>,
    pub severity: Option<FindingSeverity>,
    pub status: Option<FindingStatus>,
    pub owner_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub audit_run_id: Option<String>,
    pub finding_id: Option<String>,
    pub assignee_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Activity pages are newest first.
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub activity_type: Option<ActivityType>,
    pub performed_by: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Accumulates `column = ?N` conditions and their bound values.
pub(crate) struct Conditions {
    clauses: Vec<String>,
    params: Vec<libsql::Value>,
}

impl Conditions {
    /// Start with mandatory equality conditions (usually the tenant scope).
    pub(crate) fn new(required: &[(&str, &str)]) -> Self {
        let mut conditions = Self {
            clauses: Vec::new(),
            params: Vec::new(),
        };
        for (column, value) in required {
            conditions.push(column, *value);
        }
        conditions
    }

    pub(crate) fn push(&mut self, column: &str, value: impl Into<libsql::Value>) {
        self.params.push(value.into());
        self.clauses
            .push(format!("{column} = ?{}", self.params.len()));
    }

    pub(crate) fn push_opt<V: Into<libsql::Value>>(&mut self, column: &str, value: Option<V>) {
        if let Some(value) = value {
            self.push(column, value);
        }
    }

    /// Render ` WHERE ...` (empty when there are no conditions) followed by
    /// `ORDER BY`, `LIMIT` and `OFFSET`, and return the final parameter list.
    pub(crate) fn finish(
        mut self,
        order_by: &str,
        limit: u32,
        offset: u32,
    ) -> (String, Vec<libsql::Value>) {
        let mut sql = String::new();
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        let limit_idx = self.params.len() + 1;
        let offset_idx = limit_idx + 1;
        sql.push_str(&format!(
            " ORDER BY {order_by} LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        ));
        self.params.push(i64::from(limit).into());
        self.params.push(i64::from(offset).into());
        (sql, self.params)
    }
}
