//! Partition storage contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the durable collection/batch contract the plan service writes
//!   through.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - A batch either fully commits or leaves storage untouched.
//! - Version guards are evaluated inside the same atomic boundary as the
//!   batch they protect.

pub mod partition;
pub mod sqlite_store;
