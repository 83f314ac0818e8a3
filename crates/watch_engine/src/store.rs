//! Persisted dedup history and per-task run state.
//!
//! Two logical tables: `run_state` (task id -> last cycle start) and `seen`
//! (task id, fingerprint, first-seen time) with the fingerprint unique per
//! task id. Every call is atomic and durable on return.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use watch_core::Fingerprint;

use crate::persist::ensure_output_dir;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store directory unavailable: {0}")]
    Directory(String),
    #[error("stored timestamp {0} is out of range")]
    Timestamp(i64),
    #[error("time {0} cannot be stored at nanosecond precision")]
    Unrepresentable(DateTime<Utc>),
    #[error("store lock poisoned")]
    Poisoned,
}

/// One accepted record, as remembered by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenEntry {
    pub task_id: String,
    pub fingerprint: Fingerprint,
    pub seen_at: DateTime<Utc>,
}

/// Task-scoped dedup history and scheduling state.
pub trait DedupStore: Send + Sync {
    fn last_run(&self, task_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn mark_run_start(&self, task_id: &str, now: DateTime<Utc>) -> Result<(), StoreError>;

    fn contains(&self, task_id: &str, fingerprint: &Fingerprint) -> Result<bool, StoreError>;

    /// Inserts a seen entry. Registering a fingerprint twice is a no-op.
    fn register(
        &self,
        task_id: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS run_state (
        task_id     TEXT PRIMARY KEY,
        last_run_ns INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS seen (
        task_id     TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        seen_at_ms  INTEGER NOT NULL,
        PRIMARY KEY (task_id, fingerprint)
    );
";

/// SQLite-backed store.
///
/// Runs with `synchronous=FULL` so a committed `register` survives a crash.
pub struct SqliteDedupStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteDedupStore {
    /// Opens (or creates) the database at `path`, creating its directory.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            ensure_output_dir(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::init(path.to_path_buf(), conn)
    }

    /// Private in-process database; contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(PathBuf::from(":memory:"), Connection::open_in_memory()?)
    }

    fn init(path: PathBuf, conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seen entries of one task, oldest first.
    pub fn history(&self, task_id: &str) -> Result<Vec<SeenEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT fingerprint, seen_at_ms FROM seen WHERE task_id = ?1 \
             ORDER BY seen_at_ms ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![task_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (fingerprint, seen_at_ms) = row?;
            entries.push(SeenEntry {
                task_id: task_id.to_string(),
                fingerprint: Fingerprint::from_stored(fingerprint),
                seen_at: from_millis(seen_at_ms)?,
            });
        }
        Ok(entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DedupStore for SqliteDedupStore {
    fn last_run(&self, task_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock()?;
        let nanos: Option<i64> = conn
            .query_row(
                "SELECT last_run_ns FROM run_state WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(nanos.map(DateTime::from_timestamp_nanos))
    }

    // Nanosecond precision: `last_run` must read back exactly `now`.
    fn mark_run_start(&self, task_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let nanos = now
            .timestamp_nanos_opt()
            .ok_or(StoreError::Unrepresentable(now))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO run_state (task_id, last_run_ns) VALUES (?1, ?2) \
             ON CONFLICT(task_id) DO UPDATE SET last_run_ns = excluded.last_run_ns",
            params![task_id, nanos],
        )?;
        Ok(())
    }

    fn contains(&self, task_id: &str, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM seen WHERE task_id = ?1 AND fingerprint = ?2",
                params![task_id, fingerprint.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn register(
        &self,
        task_id: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO seen (task_id, fingerprint, seen_at_ms) VALUES (?1, ?2, ?3)",
            params![task_id, fingerprint.as_str(), now.timestamp_millis()],
        )?;
        Ok(())
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis).ok_or(StoreError::Timestamp(millis))
}

#[derive(Debug, Default)]
struct MemoryState {
    last_run: HashMap<String, DateTime<Utc>>,
    seen: HashMap<String, HashSet<Fingerprint>>,
}

/// Non-persistent store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    state: Mutex<MemoryState>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fingerprints registered for a task.
    pub fn seen_count(&self, task_id: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.seen.get(task_id).map_or(0, HashSet::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DedupStore for MemoryDedupStore {
    fn last_run(&self, task_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.lock()?.last_run.get(task_id).copied())
    }

    fn mark_run_start(&self, task_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.lock()?.last_run.insert(task_id.to_string(), now);
        Ok(())
    }

    fn contains(&self, task_id: &str, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .seen
            .get(task_id)
            .is_some_and(|seen| seen.contains(fingerprint)))
    }

    fn register(
        &self,
        task_id: &str,
        fingerprint: &Fingerprint,
        _now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.lock()?
            .seen
            .entry(task_id.to_string())
            .or_default()
            .insert(fingerprint.clone());
        Ok(())
    }
}
