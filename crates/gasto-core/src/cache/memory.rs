//! Tier 1: in-process cache with per-entry TTL

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use super::CacheTier;

/// Upper bound on entries before expired ones are swept
const DEFAULT_CAPACITY: usize = 10_000;

struct Slot {
    value: String,
    expires_at: Instant,
}

/// In-memory cache shared by every classifier clone in the process
pub struct EphemeralCache {
    entries: Mutex<HashMap<String, Slot>>,
    default_ttl: Duration,
    capacity: usize,
}

impl EphemeralCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(default_ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            capacity: capacity.max(1),
        }
    }

    /// Number of stored entries, live or not
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheTier for EphemeralCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => {
                warn!("Ephemeral cache lock poisoned, treating as miss");
                return None;
            }
        };

        match entries.get(key) {
            Some(slot) if Instant::now() < slot.expires_at => Some(slot.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Ephemeral cache lock poisoned, dropping write");
            return;
        };

        let now = Instant::now();
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            entries.retain(|_, slot| now < slot.expires_at);
            if entries.len() >= self.capacity {
                // Still full: evict the entry closest to expiry
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, slot)| slot.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: now + ttl.unwrap_or(self.default_ttl),
            },
        );
    }
}
