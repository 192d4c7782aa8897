//! Persistent classification cache rows
//!
//! Rows are never filtered by expiry here; callers evaluate `expires_at`
//! when they read an entry.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::CacheEntry;

impl Database {
    /// Create or overwrite a cache entry (last write wins)
    pub fn upsert_cache_entry(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO ai_cache (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                created_at = CURRENT_TIMESTAMP
            "#,
            params![key, value, expires_at.as_ref().map(format_datetime)],
        )?;
        Ok(())
    }

    /// Look up a cache row by key, including expired rows
    pub fn find_cache_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                "SELECT key, value, created_at, expires_at FROM ai_cache WHERE key = ?",
                params![key],
                |row| {
                    let created_at_str: String = row.get(2)?;
                    let expires_at_str: Option<String> = row.get(3)?;
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        created_at: parse_datetime(&created_at_str)?,
                        expires_at: expires_at_str.as_deref().map(parse_datetime).transpose()?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Count rows in the persistent cache (expired rows included)
    pub fn count_cache_entries(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM ai_cache", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete rows whose expiry has passed. Returns the number removed.
    pub fn delete_expired_cache_entries(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM ai_cache WHERE expires_at IS NOT NULL AND expires_at <= ?",
            params![format_datetime(&Utc::now())],
        )?;
        Ok(deleted)
    }
}
