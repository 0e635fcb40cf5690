//! SQLite-backed key-value store.
//!
//! # Invariants
//! - One row per storage key; the row id is the JSON encoding of `Key`.
//! - `set_many` runs inside one transaction; a rejected key does not abort
//!   the rest of the batch.
//! - Values larger than `MAX_VALUE_BYTES` are rejected per key.

use super::{FailureMap, Key, KeyValueError, KeyValueStore, KvResult};
use crate::db::{open_db, open_db_in_memory, DbError};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Upper bound on one serialized value.
pub const MAX_VALUE_BYTES: usize = 1024 * 1024;

const UPSERT_SQL: &str = "INSERT INTO field_values (
        storage_key,
        block_family,
        scope,
        user_id,
        block_scope_id,
        field_name,
        value_json
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(storage_key) DO UPDATE SET
        value_json = excluded.value_json,
        updated_at = (strftime('%s', 'now') * 1000);";

/// Persistent store over one SQLite connection.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        let conn = open_db(path).map_err(unavailable)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> KvResult<Self> {
        let conn = open_db_in_memory().map_err(unavailable)?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| KeyValueError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &Key) -> KvResult<Value> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM field_values WHERE storage_key = ?1;",
                [storage_key(key)?],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        let raw = raw.ok_or_else(|| KeyValueError::KeyNotFound(key.clone()))?;
        serde_json::from_str(&raw).map_err(|err| {
            KeyValueError::Backend(format!("invalid stored value for {key}: {err}"))
        })
    }

    fn set(&self, key: &Key, value: Value) -> KvResult<()> {
        let conn = self.lock()?;
        upsert(&conn, key, &value)
    }

    fn delete(&self, key: &Key) -> KvResult<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "DELETE FROM field_values WHERE storage_key = ?1;",
                [storage_key(key)?],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(KeyValueError::KeyNotFound(key.clone()));
        }
        Ok(())
    }

    fn has(&self, key: &Key) -> KvResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM field_values WHERE storage_key = ?1;",
                [storage_key(key)?],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        Ok(found.is_some())
    }

    fn set_many(&self, updates: Vec<(Key, Value)>) -> KvResult<FailureMap> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|err| {
            error!("event=kvs_set_many module=kvs status=error error_code=tx_begin_failed error={err}");
            KeyValueError::Unavailable(err.to_string())
        })?;

        let total = updates.len();
        let mut failures = FailureMap::new();
        for (key, value) in updates {
            if let Err(err) = upsert(&tx, &key, &value) {
                failures.insert(key, err);
            }
        }

        tx.commit().map_err(|err| {
            error!("event=kvs_set_many module=kvs status=error error_code=tx_commit_failed error={err}");
            KeyValueError::Unavailable(err.to_string())
        })?;
        info!(
            "event=kvs_set_many module=kvs status=ok total={} failed={}",
            total,
            failures.len()
        );
        Ok(failures)
    }
}

fn upsert(conn: &Connection, key: &Key, value: &Value) -> KvResult<()> {
    let value_json = serde_json::to_string(value).map_err(|err| KeyValueError::Rejected {
        key: key.clone(),
        message: err.to_string(),
    })?;
    if value_json.len() > MAX_VALUE_BYTES {
        return Err(KeyValueError::Rejected {
            key: key.clone(),
            message: format!(
                "value is {} bytes, limit is {MAX_VALUE_BYTES}",
                value_json.len()
            ),
        });
    }

    conn.execute(
        UPSERT_SQL,
        params![
            storage_key(key)?,
            key.block_family.as_str(),
            key.scope.as_str(),
            key.user_id.as_deref(),
            key.block_scope_id.as_deref(),
            key.field_name.as_str(),
            value_json,
        ],
    )
    .map_err(backend)?;
    Ok(())
}

fn storage_key(key: &Key) -> KvResult<String> {
    serde_json::to_string(key)
        .map_err(|err| KeyValueError::Backend(format!("cannot encode key {key}: {err}")))
}

fn backend(err: rusqlite::Error) -> KeyValueError {
    KeyValueError::Backend(err.to_string())
}

fn unavailable(err: DbError) -> KeyValueError {
    KeyValueError::Unavailable(err.to_string())
}
