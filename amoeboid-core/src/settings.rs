//! Per-server bot settings
//!
//! Reads fall back to the configured defaults without creating a row; the
//! first change for a server creates its row with defaults and then applies
//! the change in the same transaction. Rows are never deleted.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{InputError, Result};
use crate::query::Wrapping;
use crate::store::Database;

/// Settings for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub server_id: String,
    pub command_prefix: String,
    pub wrapping_pattern: String,
}

/// Settings store backed by the `settings` table
#[derive(Debug, Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
    default_prefix: String,
    default_wrapping: String,
}

impl SettingsStore {
    pub fn new(
        db: Arc<Database>,
        default_prefix: impl Into<String>,
        default_wrapping: impl Into<String>,
    ) -> Self {
        Self {
            db,
            default_prefix: default_prefix.into(),
            default_wrapping: default_wrapping.into(),
        }
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    pub fn default_wrapping(&self) -> &str {
        &self.default_wrapping
    }

    /// Current settings for a server, defaults applied when none are stored
    pub fn get(&self, server_id: &str) -> Result<GuildSettings> {
        let stored = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT prefix, wrapping FROM settings WHERE server_id = ?1",
                params![server_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
        })?;

        let (command_prefix, wrapping_pattern) = stored.unwrap_or_else(|| {
            (self.default_prefix.clone(), self.default_wrapping.clone())
        });

        Ok(GuildSettings {
            server_id: server_id.to_string(),
            command_prefix,
            wrapping_pattern,
        })
    }

    pub fn get_prefix(&self, server_id: &str) -> Result<String> {
        Ok(self.get(server_id)?.command_prefix)
    }

    pub fn get_wrapping(&self, server_id: &str) -> Result<String> {
        Ok(self.get(server_id)?.wrapping_pattern)
    }

    pub fn set_prefix(&self, server_id: &str, prefix: &str) -> Result<()> {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(InputError::InvalidPrefix(prefix.to_string()).into());
        }

        self.write(server_id, "UPDATE settings SET prefix = ?1 WHERE server_id = ?2", prefix)?;
        info!(server = %server_id, prefix = %prefix, "Changed command prefix");
        Ok(())
    }

    pub fn set_wrapping(&self, server_id: &str, wrapping: &str) -> Result<()> {
        let wrapping = Wrapping::parse(wrapping.trim())?.pattern();

        self.write(
            server_id,
            "UPDATE settings SET wrapping = ?1 WHERE server_id = ?2",
            &wrapping,
        )?;
        info!(server = %server_id, wrapping = %wrapping, "Changed mention wrapping");
        Ok(())
    }

    fn write(&self, server_id: &str, update_sql: &str, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO settings(server_id, prefix, wrapping) VALUES (?1, ?2, ?3)",
                params![server_id, self.default_prefix, self.default_wrapping],
            )?;
            tx.execute(update_sql, params![value, server_id])?;
            tx.commit()
        })
    }

    /// Number of servers with stored settings
    pub fn server_count(&self) -> Result<usize> {
        let count: i64 = self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
        })?;
        Ok(count as usize)
    }
}
