//! SQLite bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure the connection backing the partition store.
//! - Bring the collection tables to the schema this binary expects.
//!
//! # Invariants
//! - The applied schema version is tracked via `PRAGMA user_version`.
//! - Partition data is never touched before migrations succeed.
//! - A database written by a newer binary is rejected, not "repaired".

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The database was last written by a newer build; opening it read-write
    /// could corrupt state that build depends on.
    SchemaNewerThanSupported { stored: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SchemaNewerThanSupported { stored, supported } => write!(
                f,
                "stored schema version {stored} is newer than this build supports ({supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaNewerThanSupported { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
