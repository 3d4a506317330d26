use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-process cache of relevance scores
///
/// Keyed by `title_company_position` (case-sensitive). Unbounded by default:
/// entries live for the whole process. A capacity turns on size-based
/// eviction.
#[derive(Clone)]
pub struct ScoreCache {
    scores: moka::future::Cache<String, f64>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ScoreCache {
    /// Cache that never evicts
    pub fn unbounded() -> Self {
        Self::from_cache(moka::future::Cache::builder().build())
    }

    /// Cache holding at most `max_entries` scores
    pub fn with_capacity(max_entries: u64) -> Self {
        Self::from_cache(moka::future::Cache::builder().max_capacity(max_entries).build())
    }

    /// Bounded when `capacity` is set, unbounded otherwise
    pub fn from_capacity(capacity: Option<u64>) -> Self {
        match capacity {
            Some(max_entries) => Self::with_capacity(max_entries),
            None => Self::unbounded(),
        }
    }

    fn from_cache(scores: moka::future::Cache<String, f64>) -> Self {
        Self {
            scores,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the cache key for a posting scored against a requested position
    pub fn key(title: &str, company: &str, position: &str) -> String {
        format!("{}_{}_{}", title, company, position)
    }

    pub async fn get(&self, key: &str) -> Option<f64> {
        match self.scores.get(key).await {
            Some(score) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Score cache hit: {}", key);
                Some(score)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Score cache miss: {}", key);
                None
            }
        }
    }

    pub async fn insert(&self, key: String, score: f64) {
        self.scores.insert(key, score).await;
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.scores.run_pending_tasks().await;

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            entries: self.scores.entry_count(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if lookups > 0 { hits as f64 / lookups as f64 } else { 0.0 },
        }
    }
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}
