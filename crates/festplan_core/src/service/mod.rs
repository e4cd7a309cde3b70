//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate partition reads/writes into the versioned read and write
//!   paths consumed by HTTP handlers.
//! - Keep the HTTP layer decoupled from storage details.

pub mod legacy_import;
pub mod plan_service;
