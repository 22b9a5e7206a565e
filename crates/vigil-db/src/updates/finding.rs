//! Finding update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_core::enums::{FindingSeverity, FindingStatus};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<FindingSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FindingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_plan: Option<Option<String>>,
}

impl FindingUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.severity.is_none()
            && self.status.is_none()
            && self.owner_id.is_none()
            && self.due_date.is_none()
            && self.remediation_plan.is_none()
    }
}

pub struct FindingUpdateBuilder(FindingUpdate);

impl FindingUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(FindingUpdate::default())
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.0.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: FindingSeverity) -> Self {
        self.0.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn status(mut self, status: FindingStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn owner_id(mut self, owner_id: Option<String>) -> Self {
        self.0.owner_id = Some(owner_id);
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.0.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn remediation_plan(mut self, remediation_plan: Option<String>) -> Self {
        self.0.remediation_plan = Some(remediation_plan);
        self
    }

    #[must_use]
    pub fn build(self) -> FindingUpdate {
        self.0
    }
}

impl Default for FindingUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
