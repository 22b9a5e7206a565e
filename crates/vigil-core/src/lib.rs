//! # vigil-core
//!
//! Core types, ID prefixes, and error types for Vigil.
//!
//! This crate provides the foundational types shared across all Vigil crates:
//! - Entity structs for all domain objects (audit runs, controls, findings, tasks, activity)
//! - Status, severity, role, and activity enums
//! - ID prefix constants
//! - Cross-cutting error types
//! - Typed activity detail payloads
//! - API response types

pub mod activity_detail;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod responses;
