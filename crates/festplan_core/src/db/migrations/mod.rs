//! Schema migration registry and executor.
//!
//! # Responsibility
//! - Hold the ordered list of schema migrations for the collection tables.
//! - Apply whatever is pending in one transaction.
//!
//! # Invariants
//! - Migration versions are strictly increasing.
//! - `PRAGMA user_version` always reflects the last applied migration.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_partitions.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the database up to [`latest_version`], applying nothing when it is
/// already there.
///
/// # Errors
/// - [`DbError::SchemaNewerThanSupported`] when the stored version is ahead
///   of this binary.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stored = stored_schema_version(conn)?;
    let latest = latest_version();

    if stored > latest {
        return Err(DbError::SchemaNewerThanSupported {
            stored,
            supported: latest,
        });
    }

    if stored == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > stored) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from={stored} to={latest}");
    Ok(())
}

fn stored_schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
