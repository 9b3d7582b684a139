//! LRU cache in front of an embedding provider.
//!
//! Keys are query texts with surrounding whitespace trimmed and inner runs of
//! whitespace collapsed. Only successful embeddings are cached.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::EmbeddingProvider;
use crate::error::{RetrievalError, Result};

pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached query vectors.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmbeddingProvider for CachedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key(text);
        {
            let mut cache = self.cache.lock().map_err(|e| {
                RetrievalError::EmbeddingService(format!("query cache lock poisoned: {e}"))
            })?;
            if let Some(hit) = cache.get(&key) {
                tracing::trace!(query = %key, "query embedding cache hit");
                return Ok(hit.clone());
            }
        }

        // The lock is not held across the remote call.
        let vector = self.inner.embed(text)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, vector.clone());
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

fn cache_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl EmbeddingProvider for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RetrievalError::EmbeddingService("down".into()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    fn counting(fail: bool) -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn repeated_queries_hit_cache() {
        let inner = counting(false);
        let cached = CachedEmbedder::new(inner.clone(), NonZeroUsize::new(4).unwrap());

        let first = cached.embed("data science").unwrap();
        let second = cached.embed("  data   science ").unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let inner = counting(true);
        let cached = CachedEmbedder::new(inner.clone(), NonZeroUsize::new(4).unwrap());

        assert!(cached.embed("python").is_err());
        assert!(cached.embed("python").is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }

    #[test]
    fn evicts_least_recently_used() {
        let inner = counting(false);
        let cached = CachedEmbedder::new(inner.clone(), NonZeroUsize::new(1).unwrap());

        cached.embed("first").unwrap();
        cached.embed("second").unwrap();
        cached.embed("first").unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cache_key_collapses_whitespace() {
        assert_eq!(cache_key("  web\tdev  course "), "web dev course");
    }
}
