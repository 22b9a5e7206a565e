//! Update builder types for entity mutations.
//!
//! Each builder produces an update struct with `Option` fields. Only `Some`
//! fields generate SET clauses in the dynamic UPDATE SQL. Nullable columns use
//! `Option<Option<T>>`: `Some(None)` clears the column.

pub mod audit_control;
pub mod audit_run;
pub mod finding;
pub mod task;

/// Accumulates `column = ?N` assignments for a dynamic UPDATE.
pub(crate) struct SetClauses {
    sets: Vec<String>,
    params: Vec<libsql::Value>,
}

impl SetClauses {
    pub(crate) const fn new() -> Self {
        Self {
            sets: Vec::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, column: &str, value: impl Into<libsql::Value>) {
        self.params.push(value.into());
        self.sets.push(format!("{column} = ?{}", self.params.len()));
    }

    /// Set a nullable column; `None` writes SQL NULL.
    pub(crate) fn set_nullable<V: Into<libsql::Value>>(&mut self, column: &str, value: Option<V>) {
        self.set(column, value.map_or(libsql::Value::Null, Into::into));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Render `UPDATE {table} SET ..., updated_at = ? WHERE id = ?`.
    pub(crate) fn into_statement(
        mut self,
        table: &str,
        updated_at: &str,
        id: &str,
    ) -> (String, Vec<libsql::Value>) {
        self.set("updated_at", updated_at.to_string());
        self.params.push(id.to_string().into());
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{}",
            self.sets.join(", "),
            self.params.len()
        );
        (sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_appends_updated_at_and_id() {
        let mut clauses = SetClauses::new();
        clauses.set("name", "FY27");
        clauses.set_nullable::<String>("description", None);
        assert!(!clauses.is_empty());

        let (sql, params) = clauses.into_statement("audit_runs", "2026-01-01T00:00:00+00:00", "run-1");
        assert_eq!(
            sql,
            "UPDATE audit_runs SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4"
        );
        assert_eq!(params.len(), 4);
        assert_eq!(params[1], libsql::Value::Null);
    }
}
