// src/database.rs

use crate::error::StorageError;
use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Durable medium for the serialized state snapshot: one key, one document.
pub trait SnapshotStorage {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
}

fn check_quota(quota_bytes: Option<usize>, value: &str) -> Result<()> {
    match quota_bytes {
        Some(limit) if value.len() > limit => Err(StorageError::QuotaExceeded {
            needed: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

// --- SQLite ---

pub struct SqliteStorage {
    conn: Connection,
    quota_bytes: Option<usize>,
}

impl SqliteStorage {
    pub fn open(path: &Path, quota_bytes: Option<usize>) -> Result<Self> {
        info!("Opening progress database at {:?}", path);
        let conn = Connection::open(path)?;
        Self::from_connection(conn, quota_bytes)
    }

    pub fn open_in_memory(quota_bytes: Option<usize>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, quota_bytes)
    }

    fn from_connection(conn: Connection, quota_bytes: Option<usize>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn, quota_bytes })
    }
}

pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    debug!("init_db: Checking database schema...");
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        ",
    )
}

impl SnapshotStorage for SqliteStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        check_quota(self.quota_bytes, value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, Utc::now().timestamp()],
        )?;
        debug!("[DB] Wrote {} bytes under '{}'", value.len(), key);
        Ok(())
    }
}

// --- In-memory ---

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    quota_bytes: Option<usize>,
    failing_writes: usize,
    write_count: usize,
}

/// Volatile storage for tests and hosts without a disk. Clones share the
/// same contents so a caller can inspect what the store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        let storage = Self::default();
        storage.inner.borrow_mut().quota_bytes = Some(quota_bytes);
        storage
    }

    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        self.inner.borrow_mut().quota_bytes = quota_bytes;
    }

    /// Makes the next `count` writes fail as if the medium were unavailable.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.borrow_mut().failing_writes = count;
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().write_count
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .values
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().values.get(key).cloned()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(StorageError::Unavailable("simulated write failure".into()));
        }
        check_quota(inner.quota_bytes, value)?;
        inner.values.insert(key.to_string(), value.to_string());
        inner.write_count += 1;
        Ok(())
    }
}
