//! Partition store contract: collections, batches and version guards.
//!
//! # Responsibility
//! - Name the durable collections the plan document decomposes into.
//! - Define the atomic write batch and its compare-and-swap version guard.
//!
//! # Invariants
//! - `config/metadata` is the only unit consulted by version guards.
//! - `ReplaceCollection` removes every stored key absent from its entry set
//!   within the same batch, so deletions ride the same commit as upserts.

use crate::db::DbError;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed key of the grocery list unit inside [`Collection::Lists`].
pub const LIST_GROCERIES: &str = "groceries";
/// Fixed key of the activity log unit inside [`Collection::Lists`].
pub const LIST_ACTIVITY: &str = "activity";
/// Fixed key of the settings unit inside [`Collection::Config`].
pub const CONFIG_SETTINGS: &str = "settings";
/// Fixed key of the version metadata unit inside [`Collection::Config`].
pub const CONFIG_METADATA: &str = "metadata";
/// Fixed key of the monolithic snapshot inside [`Collection::Legacy`].
pub const LEGACY_SNAPSHOT: &str = "snapshot";

pub type StoreResult<T> = Result<T, StoreError>;

/// Generic store error for partition persistence and batch commits.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// A version guard did not match the stored version. No mutation was
    /// performed.
    Conflict {
        expected: String,
        actual: String,
    },
    /// A persisted unit body was not valid JSON, or a batch op could not be
    /// serialized.
    InvalidUnit(String),
}

impl StoreError {
    /// Returns whether this error is a version-guard conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict { expected, actual } => write!(
                f,
                "version guard mismatch: expected `{expected}`, stored `{actual}`"
            ),
            Self::InvalidUnit(message) => write!(f, "invalid stored unit: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict { .. } => None,
            Self::InvalidUnit(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable collections the logical document decomposes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// One unit per slot key.
    Slots,
    /// Fixed-key list units (`groceries`, `activity`), each `{"items": [...]}`.
    Lists,
    /// Fixed-key config units (`settings`, `metadata`).
    Config,
    /// Pre-migration monolithic snapshot, read-only after import.
    Legacy,
}

/// Precondition a batch commit evaluates against the stored version.
///
/// Guards are checked inside the batch's own atomic boundary, so a passing
/// guard and the batch it protects are one indivisible observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionGuard {
    /// Commit unconditionally. Last writer wins wholesale.
    Any,
    /// Commit only when the stored version equals the given token.
    /// The sentinel `"0"` matches an absent metadata unit.
    Equals(String),
    /// Commit only when no metadata unit exists yet. First-writer-wins
    /// initialization; the losing racer observes a conflict.
    Unset,
}

/// One mutation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Upsert {
        collection: Collection,
        key: String,
        body: Value,
    },
    Delete {
        collection: Collection,
        key: String,
    },
    /// Replace the full key set of a collection: keys absent from `entries`
    /// are removed, the rest upserted, all within the batch.
    ReplaceCollection {
        collection: Collection,
        entries: Vec<(String, Value)>,
    },
}

/// An atomic all-or-nothing mutation of the partition store.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub guard: VersionGuard,
    pub ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new(guard: VersionGuard) -> Self {
        Self {
            guard,
            ops: Vec::new(),
        }
    }

    pub fn upsert(mut self, collection: Collection, key: impl Into<String>, body: Value) -> Self {
        self.ops.push(BatchOp::Upsert {
            collection,
            key: key.into(),
            body,
        });
        self
    }

    pub fn delete(mut self, collection: Collection, key: impl Into<String>) -> Self {
        self.ops.push(BatchOp::Delete {
            collection,
            key: key.into(),
        });
        self
    }

    pub fn replace_collection(
        mut self,
        collection: Collection,
        entries: Vec<(String, Value)>,
    ) -> Self {
        self.ops.push(BatchOp::ReplaceCollection {
            collection,
            entries,
        });
        self
    }
}

/// Storage interface for partitioned plan persistence.
///
/// Implementations must serialize each [`commit`](Self::commit) internally;
/// callers never coordinate through in-process locks.
pub trait PartitionStore {
    /// Fetches one unit body, or `None` when the key is absent.
    fn fetch_unit(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>>;

    /// Fetches every `(key, body)` pair of a collection, ordered by key.
    fn fetch_collection(&self, collection: Collection) -> StoreResult<Vec<(String, Value)>>;

    /// Applies a batch atomically. On any failure, including a guard
    /// conflict, no subset of the batch is observable.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

impl<T: PartitionStore + ?Sized> PartitionStore for std::sync::Arc<T> {
    fn fetch_unit(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        (**self).fetch_unit(collection, key)
    }

    fn fetch_collection(&self, collection: Collection) -> StoreResult<Vec<(String, Value)>> {
        (**self).fetch_collection(collection)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).commit(batch)
    }
}
