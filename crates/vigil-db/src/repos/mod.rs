//! Repository modules implementing the operations for all Vigil entities.
//!
//! Each module adds methods to `VigilService` via `impl VigilService` blocks.

pub mod activity;
pub mod audit_control;
pub mod audit_run;
pub mod catalog;
pub mod finding;
pub mod organization;
pub mod session;
pub mod task;
