//! SQLite-backed key-value store.
//!
//! The store lives at `~/.tapkit/tapkit.db` and holds one row per key in
//! a `kv` table. Values larger than the configured limit are rejected on
//! write and reported on read, mirroring the row-size limits of the
//! embedded stores the queue was designed against.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::migrations;
use super::store::{KvStore, StoreError};
use crate::config::Paths;
use crate::error::TapkitError;

/// Default maximum size of a stored value, in bytes.
pub const DEFAULT_VALUE_LIMIT: usize = 2 * 1024 * 1024;

/// SQLite key-value store.
pub struct SqliteStore {
    conn: Connection,
    value_limit: usize,
}

impl SqliteStore {
    /// Open the store at the default location.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open(value_limit: usize) -> Result<Self, TapkitError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database, value_limit)
    }

    /// Open the store at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &Path, value_limit: usize) -> Result<Self, TapkitError> {
        let conn = Connection::open(path).map_err(|e| {
            TapkitError::Storage(format!("Failed to open database {}: {e}", path.display()))
        })?;

        migrations::run(&conn).map_err(|e| TapkitError::Storage(e.to_string()))?;

        Ok(Self { conn, value_limit })
    }

    /// Open an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory(value_limit: usize) -> Result<Self, TapkitError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            TapkitError::Storage(format!("Failed to open in-memory database: {e}"))
        })?;

        migrations::run(&conn).map_err(|e| TapkitError::Storage(e.to_string()))?;

        Ok(Self { conn, value_limit })
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, TapkitError> {
        migrations::get_version(&self.conn).map_err(|e| TapkitError::Storage(e.to_string()))
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StoreError::Backend(format!("Failed to read key {key}: {e}")))?;

        // A value can exceed the limit if it was written under a larger
        // limit in an earlier run.
        if let Some(ref v) = value {
            if v.len() > self.value_limit {
                return Err(StoreError::ValueTooLarge {
                    key: key.to_string(),
                    size: v.len(),
                    limit: self.value_limit,
                });
            }
        }

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if value.len() > self.value_limit {
            return Err(StoreError::ValueTooLarge {
                key: key.to_string(),
                size: value.len(),
                limit: self.value_limit,
            });
        }

        self.conn
            .execute(
                r"INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                  ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::Backend(format!("Failed to write key {key}: {e}")))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .map_err(|e| StoreError::Backend(format!("Failed to remove key {key}: {e}")))?;

        Ok(())
    }
}
