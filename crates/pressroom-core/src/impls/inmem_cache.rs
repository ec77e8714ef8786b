//! InMemoryContentCache - process-local content cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::ports::{CacheError, Clock, ContentCache};

struct Entry {
    value: Bytes,
    expires_at: DateTime<Utc>,
}

/// Key-ordered map with per-entry expiry.
///
/// Expired entries are invisible to `get` and `list` and are dropped on the
/// next write.
pub struct InMemoryContentCache {
    entries: Mutex<BTreeMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryContentCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.lock().await.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContentCache for InMemoryContentCache {
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| CacheError::Rejected {
            key: key.to_string(),
            reason: format!("ttl out of range: {e}"),
        })?;

        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    const RETENTION: Duration = Duration::from_secs(72 * 60 * 60);

    fn setup() -> (Arc<FixedClock>, InMemoryContentCache) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache = InMemoryContentCache::new(clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_, cache) = setup();
        cache.put("https://example.com/a", Bytes::from_static(b"doc"), RETENTION).await.unwrap();

        let value = cache.get("https://example.com/a").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"doc")));
        assert_eq!(cache.get("https://example.com/b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_matches_prefix_only() {
        let (_, cache) = setup();
        for key in ["https://example.com/a", "https://example.com/ab", "https://example.org/a"] {
            cache.put(key, Bytes::from_static(b"doc"), RETENTION).await.unwrap();
        }

        let keys = cache.list("https://example.com/a").await.unwrap();
        assert_eq!(keys, vec!["https://example.com/a", "https://example.com/ab"]);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let (clock, cache) = setup();
        cache.put("https://example.com/a", Bytes::from_static(b"doc"), RETENTION).await.unwrap();

        clock.advance(chrono::Duration::hours(71));
        assert!(cache.get("https://example.com/a").await.unwrap().is_some());

        clock.advance(chrono::Duration::hours(1));
        assert!(cache.get("https://example.com/a").await.unwrap().is_none());
        assert!(cache.list("https://example.com/a").await.unwrap().is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let (_, cache) = setup();
        cache.put("k", Bytes::from_static(b"one"), RETENTION).await.unwrap();
        cache.put("k", Bytes::from_static(b"two"), RETENTION).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(Bytes::from_static(b"two")));
        assert_eq!(cache.len().await, 1);
    }
}
