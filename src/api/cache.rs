//! Short-lived response cache

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::trace;

/// Key/value store with per-entry expiry.
///
/// There is no invalidation beyond expiry. Concurrent writers to the same key
/// are last-write-wins.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process cache backed by a `HashMap`
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    trace!(key, "Cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it so the map does not grow without bound
        self.entries.write().await.remove(key);
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }
}

/// Cache that never stores anything
pub struct NoCache;

#[async_trait]
impl ResponseCache for NoCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("character_1", json!({"id": 1}), Duration::from_millis(50))
            .await;
        cache
            .set("character_2", json!({"id": 2}), Duration::from_secs(60))
            .await;

        assert_eq!(cache.get("character_1").await, Some(json!({"id": 1})));
        assert_eq!(cache.len().await, 2);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.get("character_1").await, None);
        assert_eq!(cache.get("character_2").await, Some(json!({"id": 2})));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("episode_1", json!({"name": "old"}), ttl).await;
        cache.set("episode_1", json!({"name": "new"}), ttl).await;
        assert_eq!(cache.get("episode_1").await, Some(json!({"name": "new"})));
    }

    #[tokio::test]
    async fn test_no_cache() {
        let cache = NoCache;
        cache.set("k", json!({}), Duration::from_secs(60)).await;
        assert!(cache.get("k").await.is_none());
    }
}
