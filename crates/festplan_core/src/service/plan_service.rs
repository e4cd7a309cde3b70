//! Versioned read and write paths over the partition store.
//!
//! # Responsibility
//! - Assemble the plan document from partitions, short-circuiting unchanged
//!   polls through the version token.
//! - Decompose writes into one guarded atomic batch.
//!
//! # Invariants
//! - Every successful write mints a fresh version token; tokens are opaque
//!   and never derived from content.
//! - Reads degrade to the whole empty aggregate at version `"0"` on storage
//!   failure; a partially assembled document is never paired with the
//!   authoritative version.
//! - The transition away from version `"0"` always commits under a version
//!   guard, never unconditionally.

use crate::model::document::{empty_settings, PlanDocument};
use crate::repo::partition::{
    Collection, PartitionStore, StoreResult, VersionGuard, WriteBatch, CONFIG_METADATA,
    CONFIG_SETTINGS, LIST_ACTIVITY, LIST_GROCERIES,
};
use crate::service::legacy_import::{import_legacy_snapshot, ImportOutcome};
use log::{error, info, warn};
use serde_json::{json, Value};
use uuid::Uuid;

/// Sentinel version for "no metadata unit exists yet".
pub const VERSION_UNSET: &str = "0";

/// Mints a fresh opaque version token.
///
/// Identical content written twice yields two different tokens; the token
/// identifies the write, not the bytes.
pub fn mint_version() -> String {
    Uuid::new_v4().to_string()
}

/// Result of a versioned read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The caller's cached version is current; no partition was fetched.
    NotModified { version: String },
    /// The assembled document and the version it corresponds to.
    Document {
        document: PlanDocument,
        version: String,
    },
}

impl ReadOutcome {
    pub fn version(&self) -> &str {
        match self {
            Self::NotModified { version } => version,
            Self::Document { version, .. } => version,
        }
    }
}

/// Use-case service for the shared plan document.
pub struct PlanService<S: PartitionStore> {
    store: S,
}

impl<S: PartitionStore> PlanService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrows the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the authoritative version token, `"0"` when unset.
    pub fn current_version(&self) -> StoreResult<String> {
        let metadata = self.store.fetch_unit(Collection::Config, CONFIG_METADATA)?;
        Ok(metadata_version(metadata.as_ref()))
    }

    /// Reads the plan, short-circuiting when `client_version` is current.
    ///
    /// # Contract
    /// - Runs the legacy import when no metadata unit exists yet.
    /// - `NotModified` is returned without any partition fetch.
    /// - Storage failures degrade to the whole empty aggregate at version
    ///   `"0"`; handing out real partitions next to a failed one would let a
    ///   guarded re-save delete the missing data, while `"0"` makes that
    ///   save conflict.
    pub fn read(&self, client_version: Option<&str>) -> ReadOutcome {
        let mut current = match self.store.fetch_unit(Collection::Config, CONFIG_METADATA) {
            Ok(Some(metadata)) => metadata_version(Some(&metadata)),
            Ok(None) => match self.run_legacy_import() {
                Some(version) => version,
                None => VERSION_UNSET.to_string(),
            },
            Err(err) => {
                error!("event=plan_read module=service status=error stage=version error={err}");
                return Self::degraded_outcome();
            }
        };

        if let Some(cached) = client_version {
            if cached == current {
                info!("event=plan_read module=service status=ok outcome=not_modified");
                return ReadOutcome::NotModified { version: current };
            }
        }

        // The version is fetched before the partitions, so a write landing
        // in between would pair fresh data with a stale token and the next
        // poll would refetch needlessly. One re-check catches that window.
        let mut document = match self.assemble_document() {
            Ok(document) => document,
            Err(err) => {
                error!("event=plan_read module=service status=error stage=assemble error={err}");
                return Self::degraded_outcome();
            }
        };
        if let Ok(latest) = self.current_version() {
            if latest != current {
                document = match self.assemble_document() {
                    Ok(document) => document,
                    Err(err) => {
                        error!(
                            "event=plan_read module=service status=error stage=assemble error={err}"
                        );
                        return Self::degraded_outcome();
                    }
                };
                current = latest;
            }
        }

        info!(
            "event=plan_read module=service status=ok outcome=full slots={}",
            document.slots.len()
        );
        ReadOutcome::Document {
            document,
            version: current,
        }
    }

    /// Replaces every partition and mints a new version, atomically.
    ///
    /// # Contract
    /// - With `expected_version`, the batch commits only if the stored
    ///   version still matches; otherwise no mutation happens and the
    ///   conflict is returned.
    /// - On an uninitialized store, a pending monolith is imported before
    ///   the save; the transition away from `"0"` always goes through a
    ///   version guard, never an unconditional commit.
    /// - Slot keys absent from `document.slots` are removed by the same
    ///   commit.
    ///
    /// # Errors
    /// - [`StoreError::Conflict`](crate::repo::partition::StoreError) on a
    ///   version mismatch.
    pub fn write(
        &self,
        document: &PlanDocument,
        expected_version: Option<&str>,
    ) -> StoreResult<String> {
        let guard = self.write_guard(expected_version)?;

        let new_version = mint_version();
        let slot_entries: Vec<(String, Value)> = document
            .slots
            .iter()
            .map(|(key, body)| (key.clone(), body.clone()))
            .collect();

        let batch = WriteBatch::new(guard)
            .replace_collection(Collection::Slots, slot_entries)
            .upsert(
                Collection::Lists,
                LIST_GROCERIES,
                json!({ "items": document.groceries }),
            )
            .upsert(
                Collection::Lists,
                LIST_ACTIVITY,
                json!({ "items": document.activity }),
            )
            .upsert(Collection::Config, CONFIG_SETTINGS, document.settings.clone())
            .upsert(
                Collection::Config,
                CONFIG_METADATA,
                json!({ "version": new_version }),
            );

        match self.store.commit(batch) {
            Ok(()) => {
                info!(
                    "event=plan_write module=service status=ok slots={} guarded={}",
                    document.slots.len(),
                    expected_version.is_some()
                );
                Ok(new_version)
            }
            Err(err) => {
                if err.is_conflict() {
                    warn!("event=plan_write module=service status=conflict error={err}");
                } else {
                    error!("event=plan_write module=service status=error error={err}");
                }
                Err(err)
            }
        }
    }

    /// Picks the commit guard for a write, initializing uninitialized
    /// storage first.
    ///
    /// On an initialized store a guardless save is plain last-write-wins.
    /// On an uninitialized store the legacy import runs before the save, so
    /// a monolith nobody has read yet is carried into partitions instead of
    /// being buried by the very first commit; whichever initializer loses
    /// that race observes a conflict through the guard.
    fn write_guard(&self, expected_version: Option<&str>) -> StoreResult<VersionGuard> {
        let initialized = self
            .store
            .fetch_unit(Collection::Config, CONFIG_METADATA)?
            .is_some();

        if initialized {
            return Ok(match expected_version {
                Some(expected) => VersionGuard::Equals(expected.to_string()),
                None => VersionGuard::Any,
            });
        }

        let outcome = import_legacy_snapshot(&self.store)?;
        if let ImportOutcome::Imported { version, slots } = &outcome {
            info!(
                "event=legacy_import module=service status=ok trigger=write slots={slots} version={version}"
            );
        }

        Ok(match (expected_version, outcome) {
            // The caller's expectation still decides; an import that just
            // ran makes a stale expectation conflict as usual.
            (Some(expected), _) => VersionGuard::Equals(expected.to_string()),
            (None, ImportOutcome::Imported { version, .. }) => VersionGuard::Equals(version),
            (None, ImportOutcome::NoLegacyData) => VersionGuard::Unset,
            (None, ImportOutcome::AlreadyInitialized) => VersionGuard::Any,
        })
    }

    fn run_legacy_import(&self) -> Option<String> {
        match import_legacy_snapshot(&self.store) {
            Ok(ImportOutcome::Imported { version, slots }) => {
                info!(
                    "event=legacy_import module=service status=ok trigger=read slots={slots} version={version}"
                );
                Some(version)
            }
            Ok(ImportOutcome::NoLegacyData) => None,
            Ok(ImportOutcome::AlreadyInitialized) => {
                // A concurrent write or import established the version
                // between our metadata probe and the guarded commit.
                self.current_version().ok()
            }
            Err(err) => {
                error!("event=legacy_import module=service status=error error={err}");
                None
            }
        }
    }

    /// Assembles the full aggregate; all or nothing, so one failed
    /// partition cannot surface as an empty section of an otherwise live
    /// document.
    fn assemble_document(&self) -> StoreResult<PlanDocument> {
        let slots = self
            .store
            .fetch_collection(Collection::Slots)?
            .into_iter()
            .collect();

        Ok(PlanDocument {
            slots,
            groceries: self.fetch_list(LIST_GROCERIES)?,
            activity: self.fetch_list(LIST_ACTIVITY)?,
            settings: self.fetch_settings()?,
        })
    }

    fn fetch_list(&self, key: &str) -> StoreResult<Vec<Value>> {
        let items = self
            .store
            .fetch_unit(Collection::Lists, key)?
            .and_then(|body| body.get("items").and_then(Value::as_array).cloned())
            .unwrap_or_default();
        Ok(items)
    }

    fn fetch_settings(&self) -> StoreResult<Value> {
        let settings = self
            .store
            .fetch_unit(Collection::Config, CONFIG_SETTINGS)?
            .unwrap_or_else(empty_settings);
        Ok(settings)
    }

    fn degraded_outcome() -> ReadOutcome {
        ReadOutcome::Document {
            document: PlanDocument::empty(),
            version: VERSION_UNSET.to_string(),
        }
    }
}

fn metadata_version(metadata: Option<&Value>) -> String {
    metadata
        .and_then(|body| body.get("version"))
        .and_then(Value::as_str)
        .unwrap_or(VERSION_UNSET)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_versions_are_distinct() {
        assert_ne!(mint_version(), mint_version());
    }

    #[test]
    fn metadata_version_defaults_to_sentinel() {
        assert_eq!(metadata_version(None), VERSION_UNSET);
        assert_eq!(metadata_version(Some(&json!({}))), VERSION_UNSET);
        assert_eq!(
            metadata_version(Some(&json!({ "version": "abc" }))),
            "abc"
        );
    }
}
