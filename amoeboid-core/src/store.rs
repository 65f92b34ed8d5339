//! SQLite database shared by the card cache, name corpus and settings store

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::Result;

/// A single SQLite connection guarded for use across concurrent requests
///
/// Every write goes through a transaction, so a panic while the lock is held
/// leaves the database consistent and the poisoned lock is simply recovered.
#[derive(Debug)]
pub struct Database {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        let db = Self {
            path: Some(path),
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            path: None,
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=FULL;

                CREATE TABLE IF NOT EXISTS cards (
                  name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                  raw_card TEXT NOT NULL,
                  image BLOB NOT NULL,
                  last_refreshed TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS settings (
                  server_id TEXT NOT NULL UNIQUE,
                  prefix TEXT NOT NULL,
                  wrapping TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS card_names (
                  name TEXT NOT NULL UNIQUE,
                  position INTEGER NOT NULL
                );
                "#,
            )
        })?;
        debug!(path = ?self.path, "Card database ready");
        Ok(())
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut conn)?)
    }
}
