//! SQLite-backed mapping store.
//!
//! One row per mirrored source event, keyed by
//! `(source_calendar_id, source_event_id)`. The connection stays in
//! autocommit mode, so every write is durable as soon as the statement
//! returns.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// A persisted source → target correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub source_calendar_id: String,
    pub source_event_id: String,
    pub target_event_id: String,
}

impl MirrorRecord {
    pub fn new(
        source_calendar_id: impl Into<String>,
        source_event_id: impl Into<String>,
        target_event_id: impl Into<String>,
    ) -> Self {
        Self {
            source_calendar_id: source_calendar_id.into(),
            source_event_id: source_event_id.into(),
            target_event_id: target_event_id.into(),
        }
    }

    /// The `(source_calendar_id, source_event_id)` key.
    pub fn key(&self) -> (String, String) {
        (self.source_calendar_id.clone(), self.source_event_id.clone())
    }
}

/// Durable key-value table consumed by the reconciler.
///
/// Implementations must make each write durable before returning.
pub trait MappingStore {
    /// Target event id mirrored from the given source event, if any.
    fn get(
        &self,
        source_calendar_id: &str,
        source_event_id: &str,
    ) -> Result<Option<String>, DatabaseError>;

    /// Insert or replace a record.
    fn upsert(&self, record: &MirrorRecord) -> Result<(), DatabaseError>;

    /// Remove the record for a key. Removing a missing key is not an error.
    fn delete(&self, source_calendar_id: &str, source_event_id: &str)
        -> Result<(), DatabaseError>;

    /// Every persisted record.
    fn all(&self) -> Result<Vec<MirrorRecord>, DatabaseError>;
}

/// SQLite database holding the `event_map` table.
pub struct MappingDb {
    conn: Connection,
}

impl MappingDb {
    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    DatabaseError::CreateDirFailed {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs without a file).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS event_map (
                    source_calendar_id TEXT NOT NULL,
                    source_event_id    TEXT NOT NULL,
                    target_event_id    TEXT NOT NULL,
                    PRIMARY KEY (source_calendar_id, source_event_id)
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Number of persisted records.
    pub fn count(&self) -> Result<u64, DatabaseError> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_map", [], |row| row.get::<_, u64>(0))?;
        Ok(n)
    }
}

impl MappingStore for MappingDb {
    fn get(
        &self,
        source_calendar_id: &str,
        source_event_id: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT target_event_id FROM event_map
             WHERE source_calendar_id = ?1 AND source_event_id = ?2",
        )?;
        let target = stmt
            .query_row(params![source_calendar_id, source_event_id], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(target)
    }

    fn upsert(&self, record: &MirrorRecord) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO event_map (source_calendar_id, source_event_id, target_event_id)
             VALUES (?1, ?2, ?3)",
            params![
                record.source_calendar_id,
                record.source_event_id,
                record.target_event_id
            ],
        )?;
        Ok(())
    }

    fn delete(
        &self,
        source_calendar_id: &str,
        source_event_id: &str,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM event_map WHERE source_calendar_id = ?1 AND source_event_id = ?2",
            params![source_calendar_id, source_event_id],
        )?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<MirrorRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_calendar_id, source_event_id, target_event_id
             FROM event_map
             ORDER BY source_calendar_id, source_event_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MirrorRecord {
                source_calendar_id: row.get(0)?,
                source_event_id: row.get(1)?,
                target_event_id: row.get(2)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
