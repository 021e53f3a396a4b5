use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
struct CacheInner<V> {
    entries: HashMap<String, V>,
    insertion_order: VecDeque<String>,
}

/// In-memory response cache keyed by the caller's original URL.
///
/// Entries never expire. When `max_entries` is set, the oldest insertion is
/// evicted once the limit is reached.
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    inner: Arc<RwLock<CacheInner<V>>>,
    max_entries: Option<usize>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            })),
            max_entries: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.read().await.entries.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.entries.contains_key(key)
    }

    pub async fn insert(&self, key: String, value: V) {
        let mut inner = self.inner.write().await;

        if inner.entries.insert(key.clone(), value).is_some() {
            return;
        }
        inner.insertion_order.push_back(key);

        if let Some(max) = self.max_entries {
            while inner.entries.len() > max {
                match inner.insertion_order.pop_front() {
                    Some(oldest) => {
                        debug!("Evicting cached response for {}", oldest);
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.insertion_order.clear();
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ResponseCache::new();
        assert!(cache.is_empty().await);

        cache.insert("https://reddit.com/r/a".to_string(), 1).await;
        assert_eq!(cache.get("https://reddit.com/r/a").await, Some(1));
        assert!(cache.contains("https://reddit.com/r/a").await);
        assert_eq!(cache.get("https://reddit.com/r/b").await, None);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let cache = ResponseCache::new();
        cache.insert("k".to_string(), "old").await;
        cache.insert("k".to_string(), "new").await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("k").await, Some("new"));
    }

    #[tokio::test]
    async fn test_evicts_oldest_when_full() {
        let cache = ResponseCache::new().with_max_entries(2);
        cache.insert("a".to_string(), 1).await;
        cache.insert("b".to_string(), 2).await;
        cache.insert("c".to_string(), 3).await;

        assert_eq!(cache.len().await, 2);
        assert!(!cache.contains("a").await);
        assert!(cache.contains("b").await);
        assert!(cache.contains("c").await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ResponseCache::new();
        cache.insert("a".to_string(), 1).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
