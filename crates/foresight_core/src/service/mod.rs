//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, hierarchy and roll-up calls into use-case APIs.
//! - Keep drivers (CLI, hosts) decoupled from storage details.

pub mod schedule_service;
