//! Domain model for the project/task hierarchy.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one item shape for both leaf tasks and aggregate projects.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId`.
//! - Project dates are derived data; tasks own their dates.

pub mod item;
