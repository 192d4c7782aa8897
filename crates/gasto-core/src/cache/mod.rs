//! Two-tier classification cache
//!
//! Tier 1 lives in process memory with a short TTL. Tier 2 is the
//! `ai_cache` table. Both sit behind [`CacheTier`], whose contract is that
//! it never fails: any error is logged and reported as a miss, and a
//! failed write is dropped.
//!
//! Reads consult tier 1, then tier 2. A tier 2 hit is not copied back into
//! tier 1, so the next lookup for the same key reads tier 2 again.

mod memory;
mod persistent;

pub use memory::EphemeralCache;
pub use persistent::PersistentCache;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::ClassificationSource;

/// Prefix shared by every classification cache key
pub const KEY_PREFIX: &str = "categorize_";

/// A cache tier. Implementations swallow their own errors.
pub trait CacheTier: Send + Sync {
    /// Look up a live value; expired or unreadable entries are `None`
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value. `ttl = None` uses the tier's own default.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>);
}

/// Normalize a description for keying: trim, lowercase, collapse whitespace
pub fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic cache key for a (description, amount) pair
///
/// `-50`, `-50.0` and `-50.00` map to the same key, as do descriptions that
/// differ only in case or spacing. A missing amount is distinct from zero.
pub fn fingerprint(description: &str, amount: Option<Decimal>) -> String {
    let amount = amount
        .map(|a| a.normalize().to_string())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(normalize_description(description).as_bytes());
    // Unit separator keeps ("ab", "1") and ("a", "b1") apart
    hasher.update([0x1f]);
    hasher.update(amount.as_bytes());

    format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize()))
}

/// Tier 1 and tier 2 combined, in read order
#[derive(Clone)]
pub struct TieredCache {
    ephemeral: Arc<dyn CacheTier>,
    persistent: Arc<dyn CacheTier>,
}

impl TieredCache {
    pub fn new(ephemeral: Arc<dyn CacheTier>, persistent: Arc<dyn CacheTier>) -> Self {
        Self {
            ephemeral,
            persistent,
        }
    }

    /// Check tier 1, then tier 2
    pub fn lookup(&self, key: &str) -> Option<(String, ClassificationSource)> {
        if let Some(value) = self.ephemeral.get(key) {
            debug!(key, "Tier 1 cache hit");
            return Some((value, ClassificationSource::EphemeralCache));
        }
        if let Some(value) = self.persistent.get(key) {
            debug!(key, "Tier 2 cache hit");
            return Some((value, ClassificationSource::PersistentCache));
        }
        None
    }

    /// Write through tier 1, then tier 2, each with its default TTL
    pub fn store(&self, key: &str, value: &str) {
        self.ephemeral.set(key, value, None);
        self.persistent.set(key, value, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Tier that remembers values forever and counts reads
    #[derive(Default)]
    struct RecordingTier {
        values: Mutex<HashMap<String, String>>,
        reads: Mutex<usize>,
    }

    impl CacheTier for RecordingTier {
        fn get(&self, key: &str) -> Option<String> {
            *self.reads.lock().unwrap() += 1;
            self.values.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_prefixed() {
        let a = fingerprint("Uber Trip", Some(Decimal::new(-2350, 2)));
        let b = fingerprint("Uber Trip", Some(Decimal::new(-2350, 2)));
        assert_eq!(a, b);
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_fingerprint_normalization() {
        let base = fingerprint("iFood  Pedido", Some(Decimal::new(-50, 0)));
        assert_eq!(base, fingerprint("  IFOOD pedido ", Some(Decimal::new(-5000, 2))));
        assert_eq!(base, fingerprint("ifood\tpedido", Some(Decimal::new(-500, 1))));
    }

    #[test]
    fn test_fingerprint_distinguishes_inputs() {
        let base = fingerprint("ifood", Some(Decimal::new(-5000, 2)));
        assert_ne!(base, fingerprint("ifood", Some(Decimal::new(-7500, 2))));
        assert_ne!(base, fingerprint("ifood pedido", Some(Decimal::new(-5000, 2))));
        assert_ne!(
            fingerprint("ifood", None),
            fingerprint("ifood", Some(Decimal::ZERO))
        );
        assert_ne!(fingerprint("a1", None), fingerprint("a", Some(Decimal::ONE)));
    }

    #[test]
    fn test_lookup_order_and_sources() {
        let t1 = Arc::new(RecordingTier::default());
        let t2 = Arc::new(RecordingTier::default());
        let cache = TieredCache::new(t1.clone(), t2.clone());

        assert!(cache.lookup("k").is_none());

        t2.set("k", "Lazer", None);
        assert_eq!(
            cache.lookup("k"),
            Some(("Lazer".to_string(), ClassificationSource::PersistentCache))
        );

        cache.store("k", "Transporte");
        assert_eq!(
            cache.lookup("k"),
            Some(("Transporte".to_string(), ClassificationSource::EphemeralCache))
        );
        assert_eq!(t2.values.lock().unwrap().get("k").unwrap(), "Transporte");
    }

    #[test]
    fn test_tier2_hit_is_not_promoted() {
        let t1 = Arc::new(RecordingTier::default());
        let t2 = Arc::new(RecordingTier::default());
        let cache = TieredCache::new(t1.clone(), t2.clone());

        t2.set("k", "Saúde", None);
        cache.lookup("k");
        cache.lookup("k");

        // Both lookups went through to tier 2 and tier 1 stayed empty
        assert!(t1.values.lock().unwrap().is_empty());
        assert_eq!(*t2.reads.lock().unwrap(), 2);
    }
}
