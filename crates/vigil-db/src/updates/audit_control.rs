//! Audit control update builder.

use serde::Serialize;
use vigil_core::enums::AuditControlStatus;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditControlUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AuditControlStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl AuditControlUpdate {
    /// Whether the update touches reviewer or approver assignment.
    #[must_use]
    pub const fn changes_assignment(&self) -> bool {
        self.reviewer_id.is_some() || self.approver_id.is_some()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.changes_assignment() && self.status.is_none() && self.notes.is_none()
    }
}

pub struct AuditControlUpdateBuilder(AuditControlUpdate);

impl AuditControlUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(AuditControlUpdate::default())
    }

    #[must_use]
    pub fn reviewer_id(mut self, reviewer_id: Option<String>) -> Self {
        self.0.reviewer_id = Some(reviewer_id);
        self
    }

    #[must_use]
    pub fn approver_id(mut self, approver_id: Option<String>) -> Self {
        self.0.approver_id = Some(approver_id);
        self
    }

    #[must_use]
    pub fn status(mut self, status: AuditControlStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.0.notes = Some(notes);
        self
    }

    #[must_use]
    pub fn build(self) -> AuditControlUpdate {
        self.0
    }
}

impl Default for AuditControlUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
