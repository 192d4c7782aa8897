//! Tier 2: database-backed cache (`ai_cache` table)

use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use super::CacheTier;
use crate::db::Database;
use crate::models::CacheEntry;

/// Persistent cache over the `ai_cache` table
///
/// Expiry is evaluated on read; expired rows stay until pruned with
/// [`Database::delete_expired_cache_entries`].
#[derive(Clone)]
pub struct PersistentCache {
    db: Database,
    /// Applied when `set` is called without a TTL; None means never expire
    default_ttl: Option<Duration>,
}

impl PersistentCache {
    pub fn new(db: Database, default_ttl: Option<Duration>) -> Self {
        Self { db, default_ttl }
    }

    /// Raw row lookup, expired or not. Store errors read as absent.
    pub fn find_by_key(&self, key: &str) -> Option<CacheEntry> {
        match self.db.find_cache_entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, "Persistent cache read failed, treating as miss: {}", e);
                None
            }
        }
    }
}

impl CacheTier for PersistentCache {
    fn get(&self, key: &str) -> Option<String> {
        self.find_by_key(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl
            .or(self.default_ttl)
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);

        if let Err(e) = self.db.upsert_cache_entry(key, value, expires_at) {
            warn!(key, "Persistent cache write failed: {}", e);
        }
    }
}
