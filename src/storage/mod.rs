use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};

mod schema;

/// Key-value boundary the diary persists through.
///
/// Values are opaque strings; callers own the serialization. Failures must be
/// returned, never swallowed; the repository decides how to surface them.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// On-device store backed by a single SQLite table.
#[derive(Clone)]
pub struct SqliteKvStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SqliteKvStore {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_cells WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .with_context(|| format!("reading key '{key}'"))?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO kv_cells (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )
            .with_context(|| format!("writing key '{key}'"))?;
            Ok(())
        })
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryKvStore {
    cells: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys written so far, in write order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cells.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.cells
            .lock()
            .insert(key.to_string(), value.to_string());
        self.writes.lock().push(key.to_string());
        Ok(())
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<SqliteKvStore> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(SqliteKvStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_store() -> Result<(TempDir, SqliteKvStore)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        let mut options = StorageOptions::default();
        options.database_path = paths.database_path.clone();
        let store = init(&paths, &options)?;
        Ok((temp, store))
    }

    #[test]
    fn missing_key_reads_as_none() -> Result<()> {
        let (_temp, store) = init_store()?;
        assert_eq!(store.get("diary/entries")?, None);
        Ok(())
    }

    #[test]
    fn set_then_get_round_trips() -> Result<()> {
        let (_temp, store) = init_store()?;
        store.set("diary/last-access", "1714564800000")?;
        assert_eq!(
            store.get("diary/last-access")?.as_deref(),
            Some("1714564800000")
        );
        Ok(())
    }

    #[test]
    fn set_overwrites_existing_value() -> Result<()> {
        let (_temp, store) = init_store()?;
        store.set("diary/entries", "[]")?;
        store.set("diary/entries", r#"[{"id":"a"}]"#)?;
        assert_eq!(
            store.get("diary/entries")?.as_deref(),
            Some(r#"[{"id":"a"}]"#)
        );
        Ok(())
    }

    #[test]
    fn values_survive_a_reconnect() -> Result<()> {
        let (_temp, store) = init_store()?;
        store.set("diary/moods", "[]")?;
        let reopened = store.clone();
        assert_eq!(reopened.get("diary/moods")?.as_deref(), Some("[]"));
        Ok(())
    }
}
