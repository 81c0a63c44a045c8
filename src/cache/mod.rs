//! Response caching for answered queries.
//!
//! Sits in front of the workflow as an optional short-circuit: a hit returns
//! the cached answer without invoking any capability. Backends are pluggable
//! behind [`CacheBackend`]; the default is the in-memory TTL + LRU
//! implementation in [`memory`]. A failing backend never fails a request,
//! the engine just proceeds uncached.

mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::capability::Capability;
use crate::error::CacheError;

/// Cache statistics snapshot.
///
/// `hits` and `misses` increase monotonically and reset only on `clear()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub max_size: usize,
}

/// A cached answer plus the capability that originally produced it.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: String,
    pub capability: Capability,
}

/// Pluggable response cache backend.
///
/// Implementations derive the storage key from `(scope, query)` via
/// [`cache_key`], so equivalent queries (up to normalization) share an
/// entry. Keeping derivation behind the trait lets approximate backends
/// also consult the query text itself.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a cached response. Expired entries read as absent.
    async fn get(&self, scope: &str, query: &str) -> Result<Option<CachedResponse>, CacheError>;

    /// Store a response produced by `capability`. Replaces any prior entry
    /// for the same scope and normalized query.
    async fn set(
        &self,
        scope: &str,
        query: &str,
        response: &str,
        capability: Capability,
    ) -> Result<(), CacheError>;

    /// Drop all entries and reset the hit/miss counters.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Current statistics.
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Embedding source for the optional approximate-match extension.
///
/// Strictly additive: a cache without one behaves identically to the
/// exact-match variant.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a normalized query into a similarity vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CacheError>;
}

/// Normalize a query for key derivation: trim and lower-case.
pub fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Derive the stable cache key for a scope and query.
///
/// SHA-256 hex over `scope + ":" + normalize(query)`; equal inputs always
/// produce equal keys across processes.
pub fn cache_key(scope: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(b":");
    hasher.update(normalize(query).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cosine similarity between two embedding vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let k1 = cache_key("workflow", "Find jobs in Berlin");
        let k2 = cache_key("workflow", "Find jobs in Berlin");
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64); // SHA-256 hex
    }

    #[test]
    fn key_normalizes_case_and_whitespace() {
        assert_eq!(
            cache_key("workflow", "  Find Jobs in BERLIN  "),
            cache_key("workflow", "find jobs in berlin")
        );
    }

    #[test]
    fn key_varies_by_scope() {
        assert_ne!(
            cache_key("workflow", "find jobs"),
            cache_key("books", "find jobs")
        );
    }

    #[test]
    fn key_varies_by_query() {
        assert_ne!(
            cache_key("workflow", "find jobs"),
            cache_key("workflow", "find books")
        );
    }

    #[test]
    fn cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
