//! Audit run update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_core::enums::AuditRunStatus;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRunUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AuditRunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl AuditRunUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

pub struct AuditRunUpdateBuilder(AuditRunUpdate);

impl AuditRunUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(AuditRunUpdate::default())
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.0.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.0.description = Some(description);
        self
    }

    #[must_use]
    pub fn status(mut self, status: AuditRunStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn start_date(mut self, start_date: Option<DateTime<Utc>>) -> Self {
        self.0.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: Option<DateTime<Utc>>) -> Self {
        self.0.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn build(self) -> AuditRunUpdate {
        self.0
    }
}

impl Default for AuditRunUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
