//! Key-value store backends.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;

/// Backing store for the typed cache.
///
/// Values are stored as serialised strings. Implementations must make each
/// `put` atomic per key: readers observe either the whole previous value or
/// the whole new one.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a live value. Entries past their TTL are misses.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write a value with a TTL in seconds.
    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    /// Remove a key. Missing keys are a no-op.
    async fn delete(&self, key: &str);
}

struct Entry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// In-process store on a concurrent map.
///
/// Expired entries are dropped on observation rather than by a sweeper, so
/// memory for a key is reclaimed the next time anyone touches it.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including not-yet-collected expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
            debug!(key = %key, "Evicted expired entry");
        }
        None
    }

    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl: Duration::from_secs(ttl_secs.max(1)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("k", "v".to_string(), 60).await.unwrap();
        assert_eq!(store.get("k").await.as_deref(), Some("v"));
        store.delete("k").await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_is_atomic_per_key() {
        let store = MemoryStore::new();
        store.put("k", "one".to_string(), 60).await.unwrap();
        store.put("k", "two".to_string(), 60).await.unwrap();
        assert_eq!(store.get("k").await.as_deref(), Some("two"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_is_a_miss() {
        let store = MemoryStore::new();
        // Backdate the insertion instant instead of sleeping out a real TTL
        let backdated = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .expect("monotonic clock too young");
        store.entries.insert(
            "stale".to_string(),
            Entry {
                value: "old".to_string(),
                inserted_at: backdated,
                ttl: Duration::from_secs(60),
            },
        );
        assert!(store.get("stale").await.is_none());
        // Observation evicted the entry
        assert!(!store.entries.contains_key("stale"));
    }
}
