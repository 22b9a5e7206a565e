//! ID prefix constants.
//!
//! IDs are generated in SQL as `{prefix}-{16 hex chars}`, e.g. `run-3fa8b2c19e0d4471`.

pub const PREFIX_USER: &str = "usr";
pub const PREFIX_ORGANIZATION: &str = "org";
pub const PREFIX_FRAMEWORK: &str = "fwk";
pub const PREFIX_CONTROL: &str = "ctl";
pub const PREFIX_AUDIT_RUN: &str = "run";
pub const PREFIX_AUDIT_CONTROL: &str = "arc";
pub const PREFIX_FINDING: &str = "fnd";
pub const PREFIX_TASK: &str = "tsk";
pub const PREFIX_ACTIVITY: &str = "act";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_USER,
    PREFIX_ORGANIZATION,
    PREFIX_FRAMEWORK,
    PREFIX_CONTROL,
    PREFIX_AUDIT_RUN,
    PREFIX_AUDIT_CONTROL,
    PREFIX_FINDING,
    PREFIX_TASK,
    PREFIX_ACTIVITY,
];
