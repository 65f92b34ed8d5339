//! Persistent card cache
//!
//! Keyed by canonical card name (case-insensitive). Each entry holds the raw
//! upstream record, the image bytes served for it and the time it was last
//! refreshed. Entries older than the refresh interval are reported as stale
//! and refetched by the caller; they are only replaced once a refetch succeeds.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AmoeboidError, Result};
use crate::query::Query;
use crate::store::Database;

/// A cached card
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub canonical_name: String,
    pub raw_record: serde_json::Value,
    pub image_bytes: Vec<u8>,
    pub last_refreshed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_refreshed
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, refresh_interval: Duration) -> bool {
        self.age(now) < refresh_interval
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Within the refresh window; serve as-is
    Fresh(CacheEntry),
    /// Present but due for a refetch
    Stale(CacheEntry),
    Miss,
}

impl CacheLookup {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub stale_count: usize,
    pub image_bytes: u64,
}

/// Card cache backed by the `cards` table
#[derive(Debug, Clone)]
pub struct CatalogCache {
    db: Arc<Database>,
    refresh_interval: Duration,
}

impl CatalogCache {
    pub fn new(db: Arc<Database>, refresh_interval: Duration) -> Self {
        Self {
            db,
            refresh_interval,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Look up a card by canonical name
    ///
    /// Queries carrying parameters always miss: they select a printing the
    /// name-keyed cache cannot represent.
    pub fn lookup(&self, canonical_name: &str, query: &Query) -> Result<CacheLookup> {
        self.lookup_at(canonical_name, query, Utc::now())
    }

    /// Same as [`lookup`](Self::lookup) with an explicit clock reading
    pub fn lookup_at(
        &self,
        canonical_name: &str,
        query: &Query,
        now: DateTime<Utc>,
    ) -> Result<CacheLookup> {
        if query.has_parameters() {
            debug!(card = %canonical_name, "Cache bypassed for parameterised query");
            return Ok(CacheLookup::Miss);
        }

        let Some(entry) = self.get(canonical_name)? else {
            debug!(card = %canonical_name, "Cache miss");
            return Ok(CacheLookup::Miss);
        };

        if entry.is_fresh(now, self.refresh_interval) {
            debug!(
                card = %entry.canonical_name,
                age_hours = entry.age(now).num_hours(),
                "Cache hit"
            );
            Ok(CacheLookup::Fresh(entry))
        } else {
            debug!(
                card = %entry.canonical_name,
                age_hours = entry.age(now).num_hours(),
                "Cache entry is stale"
            );
            Ok(CacheLookup::Stale(entry))
        }
    }

    /// Fetch an entry regardless of freshness
    pub fn get(&self, canonical_name: &str) -> Result<Option<CacheEntry>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT name, raw_card, image, last_refreshed FROM cards WHERE name = ?1",
                params![canonical_name.trim()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
        })?;

        let Some((name, raw_card, image_bytes, refreshed)) = row else {
            return Ok(None);
        };

        let raw_record = serde_json::from_str(&raw_card).map_err(|e| {
            AmoeboidError::malformed(&name, format!("unreadable cached record: {e}"))
        })?;
        let last_refreshed = DateTime::parse_from_rfc3339(&refreshed)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                AmoeboidError::malformed(&name, format!("bad cache timestamp `{refreshed}`: {e}"))
            })?;

        Ok(Some(CacheEntry {
            canonical_name: name,
            raw_record,
            image_bytes,
            last_refreshed,
        }))
    }

    /// Insert or replace the entry for `canonical_name`, stamped now
    pub fn upsert(
        &self,
        canonical_name: &str,
        raw_record: &serde_json::Value,
        image_bytes: &[u8],
    ) -> Result<()> {
        self.upsert_at(canonical_name, raw_record, image_bytes, Utc::now())
    }

    /// Insert or replace with an explicit refresh time
    ///
    /// The write is committed before this returns; last write wins.
    pub fn upsert_at(
        &self,
        canonical_name: &str,
        raw_record: &serde_json::Value,
        image_bytes: &[u8],
        refreshed_at: DateTime<Utc>,
    ) -> Result<()> {
        let raw_card = serde_json::to_string(raw_record)?;
        let name = canonical_name.trim();

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                r#"
                INSERT INTO cards(name, raw_card, image, last_refreshed)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(name) DO UPDATE SET
                  name=excluded.name,
                  raw_card=excluded.raw_card,
                  image=excluded.image,
                  last_refreshed=excluded.last_refreshed
                "#,
                params![name, raw_card, image_bytes, refreshed_at.to_rfc3339()],
            )?;
            tx.commit()
        })?;

        info!(card = %name, image_bytes = image_bytes.len(), "Cached card");
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0)))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let rows: Vec<(String, i64)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT last_refreshed, length(image) FROM cards")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })?;

        let now = Utc::now();
        let stale_count = rows
            .iter()
            .filter(|(refreshed, _)| {
                DateTime::parse_from_rfc3339(refreshed)
                    .map(|t| now - t.with_timezone(&Utc) >= self.refresh_interval)
                    .unwrap_or(true)
            })
            .count();

        Ok(CacheStats {
            entry_count: rows.len(),
            stale_count,
            image_bytes: rows.iter().map(|(_, len)| *len as u64).sum(),
        })
    }

    /// Remove every cached card; returns how many were removed
    pub fn clear(&self) -> Result<usize> {
        let removed = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM cards", [])?;
            tx.commit()?;
            Ok(removed)
        })?;
        info!(removed, "Cleared card cache");
        Ok(removed)
    }
}
