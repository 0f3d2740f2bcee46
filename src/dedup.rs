//! Duplicate-alert suppression
//!
//! Bounded membership set over `(source, id)` keys, shared by every source
//! supervisor. Entries are never aged out; once the set is full the oldest
//! key is evicted to make room.

use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::RwLock;

use crate::models::ChainSource;

/// Id uniqueness is only guaranteed within a source, so the key carries both
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    source: ChainSource,
    id: String,
}

/// Bounded set of already-alerted events
pub struct DedupCache {
    // contains() does not refresh LRU recency, so eviction order equals
    // insertion order
    seen: RwLock<LruCache<DedupKey, ()>>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("Dedup capacity must be > 0"),
            )),
        }
    }

    /// Atomic check-and-set: returns `true` exactly once per `(source, id)`
    /// until the entry is evicted. The write lock spans both the membership
    /// probe and the insert, so concurrent supervisors cannot both see a
    /// key as fresh.
    pub async fn should_alert(&self, source: ChainSource, id: &str) -> bool {
        let key = DedupKey {
            source,
            id: id.to_string(),
        };
        let mut seen = self.seen.write().await;
        if seen.contains(&key) {
            return false;
        }
        seen.put(key, ());
        true
    }

    pub async fn len(&self) -> usize {
        self.seen.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.read().await.is_empty()
    }
}
