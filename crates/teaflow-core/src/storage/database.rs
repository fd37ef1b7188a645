//! SQLite-backed key-value store.
//!
//! A single `kv` table holds every JSON document the engine persists.
//! The connection sits behind a mutex so the store can be shared across
//! threads. Updates run inside `BEGIN IMMEDIATE` transactions, which also
//! serializes them against other connections to the same file.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection};

use super::{data_dir, KvStore, UpdateFn};
use crate::error::{CoreError, StorageError};

/// Current schema version.
const SCHEMA_VERSION: i32 = 1;

/// How long a statement waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

fn select_value(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn select_keys(conn: &Connection) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn.prepare_cached("SELECT key FROM kv")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut keys = Vec::new();
    for key in rows {
        keys.push(key?);
    }
    Ok(keys)
}

/// Run `body` inside `BEGIN IMMEDIATE`, committing on success.
fn immediate<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
    let result = body(conn).and_then(|value| {
        conn.execute_batch("COMMIT;")?;
        Ok(value)
    });
    if result.is_err() {
        let _ = conn.execute_batch("ROLLBACK;");
    }
    result
}

/// SQLite database for engine state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/teaflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("teaflow.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "opened teaflow database");
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );",
        )?;

        let current: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
                row.get(0)
            })
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        if current < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        }

        if current < SCHEMA_VERSION {
            conn.execute("DELETE FROM schema_version", [])?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock()?;
        select_value(&conn, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock()?;
        select_keys(&conn)
    }

    fn update(&self, keys: &[&str], f: &mut UpdateFn<'_>) -> Result<(), CoreError> {
        let conn = self.conn.lock()?;
        immediate(&conn, |conn| {
            let mut values = keys
                .iter()
                .map(|key| select_value(conn, key))
                .collect::<Result<Vec<_>, StorageError>>()?;
            f(values.as_mut_slice())?;
            for (key, value) in keys.iter().zip(&values) {
                match value {
                    Some(value) => conn.execute(
                        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                        params![key, value],
                    )?,
                    None => conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?,
                };
            }
            Ok(())
        })
    }

    fn remove_matching(&self, pred: &dyn Fn(&str) -> bool) -> Result<usize, CoreError> {
        let conn = self.conn.lock()?;
        immediate(&conn, |conn| {
            let mut removed = 0;
            for key in select_keys(conn)?.into_iter().filter(|k| pred(k.as_str())) {
                removed += conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }
            Ok(removed)
        })
    }
}
