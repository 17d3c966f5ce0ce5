//! Session-persisted options, keyed per report and company.
//!
//! The last option set a user applied is written back on every successful
//! load/reload and picked up again on the next start, unless the run asks to
//! ignore it. Storage sits behind a trait so tests run fully in memory.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::options::OptionsTree;

/// Storage id for one report's session options: `mk.dashboard:{report}:{company}`.
pub fn session_options_id(report_id: &str, company_id: &str) -> String {
  format!("mk.dashboard:{}:{}", report_id, company_id)
}

/// Backend-agnostic session option storage. Values are the JSON-serialized
/// options tree.
pub trait SessionStore: Send + Sync {
  fn get(&self, id: &str) -> Result<Option<OptionsTree>>;
  fn put(&self, id: &str, options: &OptionsTree) -> Result<()>;
  #[allow(dead_code)]
  fn contains(&self, id: &str) -> Result<bool>;
}

/// In-memory store. Used by tests and by runs that start from a clean slate.
#[derive(Default)]
pub struct MemorySessionStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    self
      .entries
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

impl SessionStore for MemorySessionStore {
  fn get(&self, id: &str) -> Result<Option<OptionsTree>> {
    match self.entries().get(id) {
      Some(raw) => {
        let options = serde_json::from_str(raw)
          .map_err(|e| eyre!("Corrupt session options for {}: {}", id, e))?;
        Ok(Some(options))
      }
      None => Ok(None),
    }
  }

  fn put(&self, id: &str, options: &OptionsTree) -> Result<()> {
    let raw =
      serde_json::to_string(options).map_err(|e| eyre!("Failed to serialize options: {}", e))?;
    self.entries().insert(id.to_string(), raw);
    Ok(())
  }

  fn contains(&self, id: &str) -> Result<bool> {
    Ok(self.entries().contains_key(id))
  }
}

/// SQLite-backed session store, so filters survive restarts.
pub struct SqliteSessionStore {
  conn: Mutex<Connection>,
}

const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_options (
    session_id TEXT PRIMARY KEY,
    options TEXT NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteSessionStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session store at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("mkdash").join("session.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| eyre!("Failed to run session migrations: {}", e))?;
    Ok(())
  }

  fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl SessionStore for SqliteSessionStore {
  fn get(&self, id: &str) -> Result<Option<OptionsTree>> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare("SELECT options FROM session_options WHERE session_id = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let raw: Option<String> = stmt.query_row(params![id], |row| row.get(0)).ok();

    match raw {
      Some(raw) => {
        let options = serde_json::from_str(&raw)
          .map_err(|e| eyre!("Corrupt session options for {}: {}", id, e))?;
        Ok(Some(options))
      }
      None => Ok(None),
    }
  }

  fn put(&self, id: &str, options: &OptionsTree) -> Result<()> {
    let raw =
      serde_json::to_string(options).map_err(|e| eyre!("Failed to serialize options: {}", e))?;

    self
      .conn()?
      .execute(
        "INSERT OR REPLACE INTO session_options (session_id, options, saved_at)
         VALUES (?, ?, datetime('now'))",
        params![id, raw],
      )
      .map_err(|e| eyre!("Failed to store session options: {}", e))?;

    Ok(())
  }

  fn contains(&self, id: &str) -> Result<bool> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare("SELECT 1 FROM session_options WHERE session_id = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let found: Option<i64> = stmt.query_row(params![id], |row| row.get(0)).ok();
    Ok(found.is_some())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn options() -> OptionsTree {
    OptionsTree::from_value(json!({
      "sections_source_id": "S1",
      "report_id": "R1",
      "date": {"filter": "this_month"},
    }))
    .unwrap()
  }

  #[test]
  fn test_session_id_format() {
    assert_eq!(
      session_options_id("mk_instance_dashboard", "7"),
      "mk.dashboard:mk_instance_dashboard:7"
    );
  }

  #[test]
  fn test_memory_store_round_trip() {
    let store = MemorySessionStore::new();
    let id = session_options_id("R1", "1");

    assert!(!store.contains(&id).unwrap());
    assert_eq!(store.get(&id).unwrap(), None);

    store.put(&id, &options()).unwrap();
    assert!(store.contains(&id).unwrap());
    assert_eq!(store.get(&id).unwrap(), Some(options()));
  }

  #[test]
  fn test_sqlite_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.db");
    let store = SqliteSessionStore::open_at(&path).unwrap();
    let id = session_options_id("R1", "1");

    assert!(!store.contains(&id).unwrap());
    store.put(&id, &options()).unwrap();
    assert_eq!(store.get(&id).unwrap(), Some(options()));

    // Last write wins.
    let mut updated = options();
    updated.set_string("report_id", "R2");
    store.put(&id, &updated).unwrap();
    assert_eq!(store.get(&id).unwrap(), Some(updated));
  }

  #[test]
  fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.db");
    let id = session_options_id("R1", "1");

    {
      let store = SqliteSessionStore::open_at(&path).unwrap();
      store.put(&id, &options()).unwrap();
    }

    let store = SqliteSessionStore::open_at(&path).unwrap();
    assert_eq!(store.get(&id).unwrap(), Some(options()));
  }
}
