//! SQLite-backed partition store.
//!
//! # Responsibility
//! - Map collections onto one table each and batches onto one transaction.
//! - Evaluate version guards inside the batch transaction.
//!
//! # Invariants
//! - Batches are serialized behind the connection mutex; each runs in one
//!   immediate transaction, so readers never observe a partial batch.
//! - Stored bodies are JSON text; non-JSON rows are rejected on read instead
//!   of being masked.

use crate::repo::partition::{
    BatchOp, Collection, PartitionStore, StoreError, StoreResult, VersionGuard, WriteBatch,
    CONFIG_METADATA,
};
use crate::service::plan_service::VERSION_UNSET;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::Value;

/// SQLite implementation of [`PartitionStore`].
///
/// Owns its connection; handler threads share the store behind an `Arc` and
/// the internal mutex serializes every storage round trip.
pub struct SqlitePartitionStore {
    conn: Mutex<Connection>,
}

impl SqlitePartitionStore {
    /// Wraps an already-bootstrapped connection (see [`crate::db::open_db`]).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Seeds the legacy snapshot unit directly, bypassing batch semantics.
    ///
    /// Only old installations carry this row in the wild; tests use this to
    /// reproduce that state.
    pub fn seed_legacy_snapshot(&self, key: &str, body: &Value) -> StoreResult<()> {
        let conn = self.conn.lock();
        let serialized = serialize_body(Collection::Legacy, key, body)?;
        conn.execute(
            "INSERT INTO legacy (doc_key, body) VALUES (?1, ?2)
             ON CONFLICT(doc_key) DO UPDATE SET body = excluded.body;",
            params![key, serialized],
        )?;
        Ok(())
    }
}

impl PartitionStore for SqlitePartitionStore {
    fn fetch_unit(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT body FROM {} WHERE {} = ?1;",
            table_name(collection),
            key_column(collection)
        );
        let body: Option<String> = conn
            .query_row(&sql, [key], |row| row.get(0))
            .optional()?;

        match body {
            Some(text) => Ok(Some(parse_body(collection, key, &text)?)),
            None => Ok(None),
        }
    }

    fn fetch_collection(&self, collection: Collection) -> StoreResult<Vec<(String, Value)>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {key}, body FROM {table} ORDER BY {key};",
            key = key_column(collection),
            table = table_name(collection)
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let text: String = row.get(1)?;
            let body = parse_body(collection, &key, &text)?;
            entries.push((key, body));
        }

        Ok(entries)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        check_guard(&tx, &batch.guard)?;

        for op in &batch.ops {
            apply_op(&tx, op)?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn check_guard(tx: &Transaction<'_>, guard: &VersionGuard) -> StoreResult<()> {
    let stored = stored_version(tx)?;

    match guard {
        VersionGuard::Any => Ok(()),
        VersionGuard::Equals(expected) => {
            let actual = stored.as_deref().unwrap_or(VERSION_UNSET);
            if actual == expected {
                Ok(())
            } else {
                Err(StoreError::Conflict {
                    expected: expected.clone(),
                    actual: actual.to_string(),
                })
            }
        }
        VersionGuard::Unset => match stored {
            None => Ok(()),
            Some(actual) => Err(StoreError::Conflict {
                expected: VERSION_UNSET.to_string(),
                actual,
            }),
        },
    }
}

fn stored_version(tx: &Transaction<'_>) -> StoreResult<Option<String>> {
    let body: Option<String> = tx
        .query_row(
            "SELECT body FROM config WHERE config_key = ?1;",
            [CONFIG_METADATA],
            |row| row.get(0),
        )
        .optional()?;

    let Some(text) = body else {
        return Ok(None);
    };

    let metadata = parse_body(Collection::Config, CONFIG_METADATA, &text)?;
    let version = metadata
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            StoreError::InvalidUnit(format!(
                "config/{CONFIG_METADATA} body carries no string `version` field"
            ))
        })?;

    Ok(Some(version.to_string()))
}

fn apply_op(tx: &Transaction<'_>, op: &BatchOp) -> StoreResult<()> {
    match op {
        BatchOp::Upsert {
            collection,
            key,
            body,
        } => {
            let serialized = serialize_body(*collection, key, body)?;
            let sql = format!(
                "INSERT INTO {table} ({key_col}, body) VALUES (?1, ?2)
                 ON CONFLICT({key_col}) DO UPDATE SET body = excluded.body;",
                table = table_name(*collection),
                key_col = key_column(*collection)
            );
            tx.execute(&sql, params![key, serialized])?;
        }
        BatchOp::Delete { collection, key } => {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1;",
                table_name(*collection),
                key_column(*collection)
            );
            tx.execute(&sql, [key])?;
        }
        BatchOp::ReplaceCollection {
            collection,
            entries,
        } => {
            let sql = format!("DELETE FROM {};", table_name(*collection));
            tx.execute_batch(&sql)?;
            for (key, body) in entries {
                let serialized = serialize_body(*collection, key, body)?;
                let sql = format!(
                    "INSERT INTO {} ({}, body) VALUES (?1, ?2);",
                    table_name(*collection),
                    key_column(*collection)
                );
                tx.execute(&sql, params![key, serialized])?;
            }
        }
    }
    Ok(())
}

fn table_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Slots => "slots",
        Collection::Lists => "lists",
        Collection::Config => "config",
        Collection::Legacy => "legacy",
    }
}

fn key_column(collection: Collection) -> &'static str {
    match collection {
        Collection::Slots => "slot_key",
        Collection::Lists => "list_key",
        Collection::Config => "config_key",
        Collection::Legacy => "doc_key",
    }
}

fn parse_body(collection: Collection, key: &str, text: &str) -> StoreResult<Value> {
    serde_json::from_str(text).map_err(|err| {
        StoreError::InvalidUnit(format!(
            "{}/{key} body is not valid JSON: {err}",
            table_name(collection)
        ))
    })
}

fn serialize_body(collection: Collection, key: &str, body: &Value) -> StoreResult<String> {
    serde_json::to_string(body).map_err(|err| {
        StoreError::InvalidUnit(format!(
            "{}/{key} body could not be serialized: {err}",
            table_name(collection)
        ))
    })
}
