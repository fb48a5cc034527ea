//! Snapshot storage trait and SQLite implementation.
//!
//! Snapshots let a fresh session show the last known list while the first
//! fetch is still in flight. They are never treated as authoritative.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::key::ResourceKey;

/// A persisted cache value.
#[derive(Debug, Clone)]
pub struct Snapshot {
  /// Serialized JSON value
  pub data: Vec<u8>,
  /// When the snapshot was written
  pub saved_at: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
pub trait SnapshotStorage: Send + Sync {
  /// Get the snapshot for a key.
  fn load(&self, key: &ResourceKey) -> Result<Option<Snapshot>>;

  /// Store (replace) the snapshot for a key.
  fn save(&self, key: &ResourceKey, data: &[u8]) -> Result<()>;

  /// Drop the snapshot for a key.
  fn remove(&self, key: &ResourceKey) -> Result<()>;

  /// A saved UI preference, such as the dashboard sort order.
  fn preference(&self, _name: &str) -> Result<Option<String>> {
    Ok(None)
  }

  fn set_preference(&self, _name: &str, _value: &str) -> Result<()> {
    Ok(())
  }
}

/// Persists nothing. Used with `--no-cache` or `cache.persist: false`.
pub struct NoopStorage;

impl SnapshotStorage for NoopStorage {
  fn load(&self, _key: &ResourceKey) -> Result<Option<Snapshot>> {
    Ok(None)
  }

  fn save(&self, _key: &ResourceKey, _data: &[u8]) -> Result<()> {
    Ok(())
  }

  fn remove(&self, _key: &ResourceKey) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based snapshot storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Private in-memory database; nothing outlives the process.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// `cache.db` under the platform data directory.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("d9s").join("cache.db"))
  }

  fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Snapshot database lock poisoned: {}", e))
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .connection()?
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| eyre!("Failed to create snapshot table: {}", e))
  }
}

/// One snapshot row per resource key (`description` is the readable key, for
/// debugging), plus UI preferences by name.
const SNAPSHOT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshot_cache (
    storage_id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS preferences (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SnapshotStorage for SqliteStorage {
  fn load(&self, key: &ResourceKey) -> Result<Option<Snapshot>> {
    let conn = self.connection()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, saved_at FROM snapshot_cache WHERE storage_id = ?",
        params![key.storage_id()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot for {}: {}", key, e))?;

    match row {
      Some((data, saved_at)) => Ok(Some(Snapshot {
        data,
        saved_at: parse_datetime(&saved_at)?,
      })),
      None => Ok(None),
    }
  }

  fn save(&self, key: &ResourceKey, data: &[u8]) -> Result<()> {
    let conn = self.connection()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO snapshot_cache (storage_id, description, data, saved_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![key.storage_id(), key.to_string(), data],
      )
      .map_err(|e| eyre!("Failed to store snapshot for {}: {}", key, e))?;

    Ok(())
  }

  fn remove(&self, key: &ResourceKey) -> Result<()> {
    let conn = self.connection()?;

    conn
      .execute(
        "DELETE FROM snapshot_cache WHERE storage_id = ?",
        params![key.storage_id()],
      )
      .map_err(|e| eyre!("Failed to remove snapshot for {}: {}", key, e))?;

    Ok(())
  }

  fn preference(&self, name: &str) -> Result<Option<String>> {
    let conn = self.connection()?;
    conn
      .query_row(
        "SELECT value FROM preferences WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read preference {}: {}", name, e))
  }

  fn set_preference(&self, name: &str, value: &str) -> Result<()> {
    let conn = self.connection()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO preferences (name, value) VALUES (?, ?)",
        params![name, value],
      )
      .map_err(|e| eyre!("Failed to store preference {}: {}", name, e))?;
    Ok(())
  }
}

/// `datetime('now')` text, which SQLite writes in UTC.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
