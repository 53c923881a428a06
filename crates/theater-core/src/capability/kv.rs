//! Durable key-value store behind the capability slot.
//!
//! `SqliteStore` keeps one small database per installation. Every operation
//! opens its own connection, so the store is trivially `Send + Sync` and a
//! deleted database simply reappears on the next write. Migrations are
//! append-only, never edit existing entries.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, Result as SqlResult};

use crate::error::Result;

/// The durable store collaborator.
pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove the whole store. Succeeds if it does not exist.
    fn delete_store(&self) -> Result<()>;
}

/// A single schema migration, tracked in `schema_meta`.
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
        CREATE TABLE handles (
            key      TEXT PRIMARY KEY,
            value    TEXT NOT NULL,
            saved_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    ",
}];

/// Open (or create) the database at `path`, enable WAL mode and apply any
/// pending migrations.
fn open_db(path: &Path) -> SqlResult<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "wal")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_meta (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    apply_migrations(&conn)?;
    Ok(conn)
}

fn apply_migrations(conn: &Connection) -> SqlResult<()> {
    let max_applied: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_meta",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for m in MIGRATIONS {
        if m.version > max_applied {
            conn.execute_batch(m.sql)?;
            conn.execute(
                "INSERT INTO schema_meta (version) VALUES (?1)",
                [m.version],
            )?;
        }
    }
    Ok(())
}

/// SQLite-backed store at a fixed path.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The database file plus SQLite's WAL side files.
    fn files(&self) -> [PathBuf; 3] {
        let mut wal = self.path.clone().into_os_string();
        wal.push("-wal");
        let mut shm = self.path.clone().into_os_string();
        shm.push("-shm");
        [self.path.clone(), wal.into(), shm.into()]
    }
}

impl KeyValueStore for SqliteStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_db(&self.path)?;
        conn.execute(
            "INSERT INTO handles (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, saved_at = datetime('now')",
            [key, value],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let conn = open_db(&self.path)?;
        let value = conn
            .query_row("SELECT value FROM handles WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn delete_store(&self) -> Result<()> {
        for file in self.files() {
            match std::fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Non-durable store for hosts without persistent storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // a poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn delete_store(&self) -> Result<()> {
        self.entries().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new(dir.path().join("nested/handles.db"));
        (store, dir)
    }

    #[test]
    fn test_open_db_is_idempotent() {
        let (store, _dir) = temp_store();
        store.put("k", "v").unwrap();
        let conn = open_db(store.path()).unwrap();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_get_without_database_is_none_and_creates_nothing() {
        let (store, _dir) = temp_store();
        assert_eq!(store.get("userContent").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_put_overwrites() {
        let (store, _dir) = temp_store();
        store.put("userContent", "/first").unwrap();
        store.put("userContent", "/second").unwrap();
        assert_eq!(store.get("userContent").unwrap().as_deref(), Some("/second"));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn test_delete_store_removes_everything_and_tolerates_absence() {
        let (store, _dir) = temp_store();
        store.delete_store().unwrap();
        store.put("userContent", "/x").unwrap();
        store.delete_store().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get("userContent").unwrap(), None);
        store.delete_store().unwrap();
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.put("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.delete_store().unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
