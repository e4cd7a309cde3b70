//! One-shot import of the pre-partition monolithic snapshot.
//!
//! # Responsibility
//! - Detect a legacy monolithic document and rewrite it into partitions,
//!   minting the first version token.
//!
//! # Invariants
//! - The import commits under the `Unset` guard: only the first initializer
//!   of the version metadata wins, whether that is this import or a regular
//!   write racing it.
//! - The legacy unit is never written; after a successful import it is dead
//!   weight, not a source of truth.

use crate::model::document::LegacySnapshot;
use crate::repo::partition::{
    Collection, PartitionStore, StoreResult, VersionGuard, WriteBatch, CONFIG_METADATA,
    CONFIG_SETTINGS, LEGACY_SNAPSHOT, LIST_GROCERIES,
};
use crate::service::plan_service::mint_version;
use serde_json::json;

/// Result of one import attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// The snapshot was rewritten into partitions under the returned
    /// version.
    Imported { version: String, slots: usize },
    /// Nothing to import; the installation starts from the empty aggregate.
    NoLegacyData,
    /// Someone else established the version first; the guarded batch was
    /// discarded. The caller should re-read the current version.
    AlreadyInitialized,
}

/// Imports the legacy snapshot if the store carries one.
///
/// Callers invoke this only after observing an absent metadata unit; the
/// `Unset` guard re-checks that observation inside the commit itself, so a
/// racing initializer cannot be overwritten.
///
/// # Errors
/// - Storage failures are returned as-is; the caller treats the state as
///   still unmigrated and must not retry in a tight loop.
pub fn import_legacy_snapshot<S: PartitionStore>(store: &S) -> StoreResult<ImportOutcome> {
    let Some(body) = store.fetch_unit(Collection::Legacy, LEGACY_SNAPSHOT)? else {
        return Ok(ImportOutcome::NoLegacyData);
    };

    let Some(snapshot) = LegacySnapshot::from_value(body) else {
        // A malformed monolith cannot be upgraded; starting empty loses
        // nothing readable.
        return Ok(ImportOutcome::NoLegacyData);
    };

    let version = mint_version();
    let slot_count = snapshot.slots.len();

    let mut batch = WriteBatch::new(VersionGuard::Unset);
    for (key, slot) in snapshot.slots {
        batch = batch.upsert(Collection::Slots, key, slot);
    }
    batch = batch
        .upsert(
            Collection::Lists,
            LIST_GROCERIES,
            json!({ "items": snapshot.groceries }),
        )
        .upsert(Collection::Config, CONFIG_SETTINGS, snapshot.settings)
        .upsert(
            Collection::Config,
            CONFIG_METADATA,
            json!({ "version": version }),
        );

    match store.commit(batch) {
        Ok(()) => Ok(ImportOutcome::Imported {
            version,
            slots: slot_count,
        }),
        Err(err) if err.is_conflict() => Ok(ImportOutcome::AlreadyInitialized),
        Err(err) => Err(err),
    }
}
