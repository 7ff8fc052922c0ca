// SQLite-backed key-value storage

use chrono::Utc;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::storage::KeyValue;

const CURRENT_VERSION: u32 = 1;
const DB_FILE: &str = "goldtasks.db";

/// Persistent key-value store in a single SQLite table
pub struct Store {
    base_path: Option<PathBuf>,
    db: Connection,
}

impl Store {
    /// Open or create a store in the given directory
    ///
    /// The database lives at `{path}/goldtasks.db`; the directory is created if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let store = Self {
            base_path: Some(base_path),
            db,
        };

        store.create_schema()?;
        store.write_version()?;

        info!(path = ?db_path, "Opened store");
        Ok(store)
    }

    /// Open a throwaway store with no backing file
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { base_path: None, db };
        store.create_schema()?;
        Ok(store)
    }

    /// Directory holding the database, if file-backed
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Write version file
    fn write_version(&self) -> Result<()> {
        if let Some(base_path) = &self.base_path {
            let version_path = base_path.join(".version");
            if !version_path.exists() {
                fs::write(version_path, CURRENT_VERSION.to_string())?;
            }
        }
        Ok(())
    }

    pub(crate) fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(eyre!("Storage key cannot be empty"));
        }
        if key.len() > 128 {
            return Err(eyre!("Storage key too long: {} (max 128 chars)", key));
        }
        if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
        }
        Ok(())
    }
}

impl KeyValue for Store {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM records WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::validate_key(key)?;

        self.db.execute(
            "INSERT OR REPLACE INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now_ms()],
        )?;

        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.execute("DELETE FROM records WHERE key = ?1", [key])?;
        Ok(())
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
