//! Mirror storage trait and SQLite implementation.
//!
//! The mirror keeps the last successful remote response per request so the
//! client can keep working while the server is unreachable.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A response read back from the mirror.
#[derive(Debug, Clone)]
pub struct Mirrored {
  pub body: Value,
  /// When the response was recorded
  pub cached_at: DateTime<Utc>,
}

/// Trait for mirror storage backends.
pub trait MirrorStorage: Send + Sync {
  /// Record the response for the request hashed to `key`.
  fn store(&self, key: &str, request: &str, body: &Value, cached_at: DateTime<Utc>)
    -> Result<()>;

  /// The last response recorded under `key`.
  fn get(&self, key: &str) -> Result<Option<Mirrored>>;

  /// Drop responses recorded before `cutoff`. Returns how many were removed.
  fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Storage that keeps nothing, used when offline mode is disabled.
pub struct NoopStorage;

impl MirrorStorage for NoopStorage {
  fn store(&self, _key: &str, _request: &str, _body: &Value, _at: DateTime<Utc>) -> Result<()> {
    Ok(())
  }

  fn get(&self, _key: &str) -> Result<Option<Mirrored>> {
    Ok(None)
  }

  fn purge_before(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based mirror storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the mirror database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;
    Self::with_connection(conn)
  }

  /// Open the mirror at the default location under the user data directory.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Storage("could not determine data directory".into()))?;

    Ok(data_dir.join("edusync").join("mirror.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(MIRROR_SCHEMA)
      .map_err(|e| Error::Storage(format!("failed to run cache migrations: {}", e)))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
  }

  /// Number of recorded responses.
  pub fn len(&self) -> Result<usize> {
    let conn = self.conn()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM response_cache", [], |row| row.get(0))?;
    Ok(count as usize)
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}

const MIRROR_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    request_hash TEXT PRIMARY KEY,
    request TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_response_cache_cached_at
    ON response_cache(cached_at);
"#;

impl MirrorStorage for SqliteStorage {
  fn store(&self, key: &str, request: &str, body: &Value, cached_at: DateTime<Utc>) -> Result<()> {
    let data = serde_json::to_vec(body)
      .map_err(|e| Error::Storage(format!("failed to serialize response: {}", e)))?;
    let conn = self.conn()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (request_hash, request, body, cached_at)
         VALUES (?, ?, ?, ?)",
        params![key, request, data, format_datetime(cached_at)],
      )
      .map_err(|e| Error::Storage(format!("failed to store response: {}", e)))?;

    Ok(())
  }

  fn get(&self, key: &str) -> Result<Option<Mirrored>> {
    let conn = self.conn()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT body, cached_at FROM response_cache WHERE request_hash = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((data, cached_at)) => {
        let body = serde_json::from_slice(&data)
          .map_err(|e| Error::Storage(format!("failed to deserialize response: {}", e)))?;
        Ok(Some(Mirrored {
          body,
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let conn = self.conn()?;
    let removed = conn.execute(
      "DELETE FROM response_cache WHERE cached_at < ?",
      params![format_datetime(cutoff)],
    )?;
    Ok(removed)
  }
}

fn format_datetime(at: DateTime<Utc>) -> String {
  at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
    .map(|dt| dt.and_utc())
    .map_err(|e| Error::Storage(format!("failed to parse datetime '{}': {}", s, e)))
}
