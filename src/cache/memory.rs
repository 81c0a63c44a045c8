//! In-memory response cache with TTL and LRU eviction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 MemoryCache                      │
//! │  get() ──► exact key lookup ──► fresh? hit       │
//! │            │                    expired? evict   │
//! │            └─► embedding configured? nearest     │
//! │                cached query above threshold      │
//! │  set() ──► purge expired ──► evict LRU at cap    │
//! │            store entry                           │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! All mutation happens behind one `std::sync::Mutex` (never held across an
//! `.await` point), so concurrent writers cannot corrupt recency ordering or
//! overshoot the capacity bound. Reads that hit also take the lock since a
//! hit updates recency.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;

use crate::cache::{
    CacheBackend, CacheStats, CachedResponse, EmbeddingBackend, cache_key, cosine_similarity,
    normalize,
};
use crate::capability::Capability;
use crate::config::CacheConfig;
use crate::error::CacheError;

struct Entry {
    response: String,
    capability: Capability,
    scope: String,
    created_at: Instant,
    /// Recency tick; larger is more recent. Ticks are unique, so LRU
    /// eviction is deterministic even when operations share a clock instant.
    last_accessed: u64,
    embedding: Option<Vec<f32>>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
    tick: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// In-memory TTL + LRU cache, optionally with approximate matching.
pub struct MemoryCache {
    inner: Mutex<CacheInner>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    config: CacheConfig,
}

impl MemoryCache {
    /// Create an exact-match cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            embedder: None,
            config,
        }
    }

    /// Create a cache that additionally resolves misses by embedding
    /// similarity against previously cached queries in the same scope.
    pub fn with_embedder(config: CacheConfig, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            embedder: Some(embedder),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Exact lookup under the lock. Expired entries are removed here, on
    /// read, rather than by any background sweep.
    fn get_exact(&self, key: &str, now: Instant) -> Option<CachedResponse> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let fresh = match inner.entries.get(key) {
            Some(entry) => now.duration_since(entry.created_at) <= self.config.ttl,
            None => return None,
        };
        if !fresh {
            inner.entries.remove(key);
            return None;
        }
        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_accessed = tick;
        Some(CachedResponse {
            response: entry.response.clone(),
            capability: entry.capability,
        })
    }

    /// Nearest-neighbour lookup over cached embeddings in the same scope.
    fn get_similar(&self, scope: &str, query_embedding: &[f32], now: Instant) -> Option<CachedResponse> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let mut best: Option<(String, f32)> = None;
        for (key, entry) in &inner.entries {
            if entry.scope != scope || now.duration_since(entry.created_at) > self.config.ttl {
                continue;
            }
            let Some(embedding) = &entry.embedding else {
                continue;
            };
            let similarity = cosine_similarity(query_embedding, embedding);
            if similarity >= self.config.similarity_threshold
                && best.as_ref().is_none_or(|(_, s)| similarity > *s)
            {
                best = Some((key.clone(), similarity));
            }
        }

        let (key, similarity) = best?;
        tracing::debug!(similarity, "approximate cache match");
        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(&key)?;
        entry.last_accessed = tick;
        Some(CachedResponse {
            response: entry.response.clone(),
            capability: entry.capability,
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, scope: &str, query: &str) -> Result<Option<CachedResponse>, CacheError> {
        let key = cache_key(scope, query);
        let now = Instant::now();

        if let Some(hit) = self.get_exact(&key, now) {
            self.lock().hits += 1;
            tracing::debug!("response cache hit");
            return Ok(Some(hit));
        }

        // Approximate path. The embedding call happens outside the lock.
        if let Some(embedder) = &self.embedder {
            match embedder.embed(&normalize(query)).await {
                Ok(query_embedding) => {
                    if let Some(hit) = self.get_similar(scope, &query_embedding, now) {
                        self.lock().hits += 1;
                        return Ok(Some(hit));
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "embedding lookup failed, exact-match only");
                }
            }
        }

        self.lock().misses += 1;
        Ok(None)
    }

    async fn set(
        &self,
        scope: &str,
        query: &str,
        response: &str,
        capability: Capability,
    ) -> Result<(), CacheError> {
        if self.config.max_entries == 0 {
            return Ok(());
        }

        let key = cache_key(scope, query);
        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(&normalize(query)).await {
                Ok(vector) => Some(vector),
                Err(err) => {
                    tracing::debug!(error = %err, "embedding store failed, entry is exact-only");
                    None
                }
            },
            None => None,
        };

        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let tick = inner.next_tick();

        // Drop expired entries before the capacity check so they are never
        // what keeps a live entry out.
        let ttl = self.config.ttl;
        inner.entries.retain(|_, entry| now.duration_since(entry.created_at) <= ttl);

        // LRU eviction if inserting a new key at capacity.
        if !inner.entries.contains_key(&key) {
            while inner.entries.len() >= self.config.max_entries {
                let oldest_key = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_accessed)
                    .map(|(k, _)| k.clone());
                match oldest_key {
                    Some(k) => {
                        inner.entries.remove(&k);
                    }
                    None => break,
                }
            }
        }

        inner.entries.insert(
            key,
            Entry {
                response: response.to_string(),
                capability,
                scope: scope.to_string(),
                created_at: now,
                last_accessed: tick,
                embedding,
            },
        );
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut guard = self.lock();
        guard.entries.clear();
        guard.hits = 0;
        guard.misses = 0;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let guard = self.lock();
        Ok(CacheStats {
            hits: guard.hits,
            misses: guard.misses,
            size: guard.entries.len(),
            max_size: self.config.max_entries,
        })
    }
}
