//! Query embedding cache.
//!
//! Entries expire after a TTL. When the cache is full the entry with the
//! oldest access stamp is dropped (linear scan).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

use crate::embedder::{EmbedderBackend, EmbeddingResult};
use folio_core::Result;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

struct Slot {
    vector: Array1<f32>,
    stored: Instant,
    last_used: u64,
}

#[derive(Default)]
struct Slots {
    by_text: HashMap<String, Slot>,
    clock: u64,
}

impl Slots {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .by_text
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(text, _)| text.clone());
        if let Some(text) = stalest {
            self.by_text.remove(&text);
        }
    }
}

/// Bounded, expiring map from query text to embedding. Safe to share.
pub struct QueryCache {
    capacity: usize,
    ttl: Duration,
    slots: Mutex<Slots>,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Cached vector for `text`, refreshing its recency. Expired entries are
    /// dropped and reported as a miss.
    pub fn get(&self, text: &str) -> Option<Array1<f32>> {
        let mut slots = self.slots.lock();
        let now = slots.tick();
        let ttl = self.ttl;

        let slot = slots.by_text.get_mut(text)?;
        if slot.stored.elapsed() >= ttl {
            slots.by_text.remove(text);
            return None;
        }
        slot.last_used = now;
        Some(slot.vector.clone())
    }

    /// Store `vector` under `text`. A zero-capacity cache stores nothing.
    pub fn put(&self, text: String, vector: Array1<f32>) {
        if self.capacity == 0 {
            return;
        }
        let mut slots = self.slots.lock();
        let now = slots.tick();
        if !slots.by_text.contains_key(&text) && slots.by_text.len() >= self.capacity {
            slots.evict_stalest();
        }
        slots.by_text.insert(
            text,
            Slot {
                vector,
                stored: Instant::now(),
                last_used: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.slots.lock().by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

/// Wraps a backend so single-text (query) embeddings are cached.
///
/// Batch calls come from index builds and bypass the cache.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: QueryCache,
}

impl<E: EmbedderBackend> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self::with_cache(inner, QueryCache::default())
    }

    pub fn with_cache(inner: E, cache: QueryCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

impl<E: EmbedderBackend> EmbedderBackend for CachedEmbedder<E> {
    fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        if let Some(embedding) = self.cache.get(text) {
            return Ok(EmbeddingResult {
                embedding,
                cached: true,
            });
        }

        let result = self.inner.embed(text)?;
        self.cache.put(text.to_string(), result.embedding.clone());
        Ok(result)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingResult>> {
        self.inner.embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::UnavailableEmbedder;
    use crate::hashing::HashingEmbedder;
    use ndarray::array;

    #[test]
    fn test_get_after_put() {
        let cache = QueryCache::default();
        assert!(cache.get("who is he").is_none());

        cache.put("who is he".into(), array![0.6, 0.8]);
        assert_eq!(cache.get("who is he"), Some(array![0.6, 0.8]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_drops_least_recently_used() {
        let cache = QueryCache::new(2, DEFAULT_CACHE_TTL);
        cache.put("first".into(), array![1.0]);
        cache.put("second".into(), array![2.0]);
        assert!(cache.get("first").is_some());

        cache.put("third".into(), array![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("second").is_none());
        assert!(cache.get("first").is_some());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = QueryCache::new(2, DEFAULT_CACHE_TTL);
        cache.put("first".into(), array![1.0]);
        cache.put("second".into(), array![2.0]);
        cache.put("first".into(), array![9.0]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("first"), Some(array![9.0]));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = QueryCache::new(4, Duration::from_millis(1));
        cache.put("stale".into(), array![1.0]);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("stale").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = QueryCache::new(0, DEFAULT_CACHE_TTL);
        cache.put("q".into(), array![1.0]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cached_embedder_marks_hits() {
        let embedder = CachedEmbedder::new(HashingEmbedder::new(32).unwrap());
        let first = embedder.embed("where does he work").unwrap();
        let second = embedder.embed("where does he work").unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.embedding, second.embedding);
        assert_eq!(embedder.cache().len(), 1);
    }

    #[test]
    fn test_cached_embedder_batch_bypasses_cache() {
        let embedder = CachedEmbedder::new(HashingEmbedder::new(32).unwrap());
        let results = embedder.embed_batch(&["a", "b"]).unwrap();
        assert_eq!(results.len(), 2);
        assert!(embedder.cache().is_empty());
    }

    #[test]
    fn test_cached_embedder_does_not_cache_errors() {
        let embedder = CachedEmbedder::new(UnavailableEmbedder::new(8, "missing"));
        assert!(embedder.embed("q").is_err());
        assert!(embedder.cache().is_empty());
    }
}
