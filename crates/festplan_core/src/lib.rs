//! Core domain logic for Festplan.
//! This crate is the single source of truth for plan persistence invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{LegacySnapshot, PlanDocument, SlotKey};
pub use repo::partition::{
    BatchOp, Collection, PartitionStore, StoreError, StoreResult, VersionGuard, WriteBatch,
    CONFIG_METADATA, CONFIG_SETTINGS, LEGACY_SNAPSHOT, LIST_ACTIVITY, LIST_GROCERIES,
};
pub use repo::sqlite_store::SqlitePartitionStore;
pub use service::legacy_import::{import_legacy_snapshot, ImportOutcome};
pub use service::plan_service::{mint_version, PlanService, ReadOutcome, VERSION_UNSET};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
