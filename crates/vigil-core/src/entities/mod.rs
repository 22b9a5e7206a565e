//! Entity structs for all Vigil domain objects.
//!
//! Each entity maps to a table in the libSQL database (see
//! `vigil-db/migrations/001_initial.sql`). Fields serialize as `camelCase`
//! to match the HTTP API.

mod activity;
mod audit_control;
mod audit_run;
mod catalog;
mod finding;
mod organization;
mod task;
mod user;

pub use activity::AuditRunActivity;
pub use audit_control::AuditControl;
pub use audit_run::AuditRun;
pub use catalog::{Control, Framework};
pub use finding::AuditFinding;
pub use organization::{OrgMembership, Organization};
pub use task::Task;
pub use user::User;
