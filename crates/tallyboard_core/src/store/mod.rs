//! Local persistence adapter: the device-local last-write cache.
//!
//! # Responsibility
//! - Synchronous read/write of the serialized document under a single key.
//! - Retain a read-only fallback to the key used before the schema split.
//!
//! # Invariants
//! - `save` never mutates the legacy key.
//! - A failed `save` is reported to the caller; it must not roll back the
//!   in-memory document held by the engine.

use crate::db::{migrations::latest_version, DbError};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

/// Physical key holding the current serialized document.
pub const SNAPSHOT_KEY: &str = "board-state";
/// Key written by pre-split installs; read-only migration fallback.
pub const LEGACY_SNAPSHOT_KEY: &str = "board-state-v1";

pub type StoreResult<T> = Result<T, StoreError>;

/// Local persistence failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingSnapshotTable,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingSnapshotTable => write!(f, "required table `snapshots` is missing"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
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

/// Synchronous single-key snapshot persistence.
pub trait SnapshotStore: Send + Sync {
    /// Returns the persisted serialized document, if any.
    fn load(&self) -> StoreResult<Option<String>>;
    /// Persists the serialized document. Writing the same payload twice is a
    /// no-op in effect.
    fn save(&self, payload: &str) -> StoreResult<()>;
}

/// SQLite-backed snapshot store over the `snapshots` table.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    /// Wraps a bootstrapped connection, verifying that migrations ran.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let expected = latest_version();
        let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual != expected {
            return Err(StoreError::UninitializedConnection {
                expected_version: expected,
                actual_version: actual,
            });
        }

        let table_exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'snapshots'
            );",
            [],
            |row| row.get(0),
        )?;
        if table_exists != 1 {
            return Err(StoreError::MissingSnapshotTable);
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_key(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM snapshots WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = Self::read_key(&conn, SNAPSHOT_KEY)? {
            return Ok(Some(value));
        }

        let legacy = Self::read_key(&conn, LEGACY_SNAPSHOT_KEY)?;
        if legacy.is_some() {
            warn!("event=snapshot_load module=store status=ok source=legacy_key");
        }
        Ok(legacy)
    }

    fn save(&self, payload: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO snapshots (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![SNAPSHOT_KEY, payload],
        )?;
        Ok(())
    }
}
