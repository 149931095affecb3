//! Persisted client session: access token, refresh token and signed-in user.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::api::types::User;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Trait for session storage backends.
pub trait SessionStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

/// Storage that keeps the session for the lifetime of the process only.
#[derive(Default)]
pub struct MemorySessionStore {
  values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SessionStore for MemorySessionStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let values = self.values.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(values.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut values = self.values.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut values = self.values.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.remove(key);
    Ok(())
  }
}

/// SQLite-based session storage.
pub struct SqliteSessionStore {
  conn: Mutex<Connection>,
}

const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteSessionStore {
  /// Open the session database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| eyre!("Failed to run session migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("exdesk").join("session.db"))
  }
}

impl SessionStore for SqliteSessionStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn
      .query_row(
        "SELECT value FROM session WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read session key {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn
      .execute(
        "INSERT OR REPLACE INTO session (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write session key {}: {}", key, e))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn
      .execute("DELETE FROM session WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove session key {}: {}", key, e))?;
    Ok(())
  }
}

/// Typed access to the session keys on top of any store.
#[derive(Clone)]
pub struct Session {
  store: Arc<dyn SessionStore>,
}

impl Session {
  pub fn new(store: Arc<dyn SessionStore>) -> Self {
    Self { store }
  }

  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemorySessionStore::new()))
  }

  pub fn token(&self) -> Result<Option<String>> {
    self.store.get(TOKEN_KEY)
  }

  pub fn refresh_token(&self) -> Result<Option<String>> {
    self.store.get(REFRESH_TOKEN_KEY)
  }

  pub fn user(&self) -> Result<Option<User>> {
    match self.store.get(USER_KEY)? {
      Some(raw) => {
        let user = serde_json::from_str(&raw)
          .map_err(|e| eyre!("Failed to parse stored user: {}", e))?;
        Ok(Some(user))
      }
      None => Ok(None),
    }
  }

  /// Replace the access token, and the refresh token when one is issued.
  pub fn store_tokens(&self, token: &str, refresh_token: Option<&str>) -> Result<()> {
    self.store.set(TOKEN_KEY, token)?;
    if let Some(refresh) = refresh_token {
      self.store.set(REFRESH_TOKEN_KEY, refresh)?;
    }
    Ok(())
  }

  pub fn store_user(&self, user: &User) -> Result<()> {
    let raw = serde_json::to_string(user).map_err(|e| eyre!("Failed to serialize user: {}", e))?;
    self.store.set(USER_KEY, &raw)
  }

  /// Drop every credential. Used on logout and on unrecoverable 401s.
  pub fn clear(&self) -> Result<()> {
    self.store.remove(TOKEN_KEY)?;
    self.store.remove(REFRESH_TOKEN_KEY)?;
    self.store.remove(USER_KEY)
  }

  pub fn is_signed_in(&self) -> bool {
    matches!(self.token(), Ok(Some(_)))
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("signed_in", &self.is_signed_in())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::UserRole;

  fn sample_user() -> User {
    User {
      id: "u1".to_string(),
      email: "ana@example.com".to_string(),
      first_name: Some("Ana".to_string()),
      last_name: Some("Silva".to_string()),
      role: UserRole::Coordinator,
      is_active: true,
      two_fa_enabled: false,
      created_at: None,
      last_login: None,
    }
  }

  #[test]
  fn test_sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.db");

    {
      let store = SqliteSessionStore::open_at(&path).unwrap();
      store.set(TOKEN_KEY, "abc").unwrap();
      store.set(TOKEN_KEY, "def").unwrap();
    }

    let store = SqliteSessionStore::open_at(&path).unwrap();
    assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("def"));
    store.remove(TOKEN_KEY).unwrap();
    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn test_session_round_trips_user_and_tokens() {
    let session = Session::in_memory();
    assert!(!session.is_signed_in());

    session.store_tokens("t1", Some("r1")).unwrap();
    session.store_user(&sample_user()).unwrap();

    assert!(session.is_signed_in());
    assert_eq!(session.refresh_token().unwrap().as_deref(), Some("r1"));
    assert_eq!(session.user().unwrap().unwrap().email, "ana@example.com");

    // A refresh without a new refresh token keeps the old one
    session.store_tokens("t2", None).unwrap();
    assert_eq!(session.token().unwrap().as_deref(), Some("t2"));
    assert_eq!(session.refresh_token().unwrap().as_deref(), Some("r1"));
  }

  #[test]
  fn test_clear_removes_all_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSessionStore::open_at(&dir.path().join("s.db")).unwrap();
    let session = Session::new(Arc::new(store));

    session.store_tokens("t", Some("r")).unwrap();
    session.store_user(&sample_user()).unwrap();
    session.clear().unwrap();

    assert_eq!(session.token().unwrap(), None);
    assert_eq!(session.refresh_token().unwrap(), None);
    assert!(session.user().unwrap().is_none());
  }
}
