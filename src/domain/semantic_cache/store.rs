//! Cache store trait
//!
//! Bookkeeping layered on top of the vector index: the store is the sole
//! writer to the index and adds the freshness (TTL) filter on top of raw
//! nearest-neighbor results.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::embedding::SimilarityMetric;
use crate::domain::semantic_cache::CacheEntry;
use crate::domain::DomainError;

/// A fresh (non-expired) candidate returned by a store search
#[derive(Debug, Clone)]
pub struct FreshHit {
    pub entry: CacheEntry,
    pub similarity: f32,
}

/// What an eviction sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Entries removed because their TTL elapsed
    pub expired: usize,
    /// Entries removed to get back under the capacity ceiling
    pub evicted: usize,
}

impl EvictionReport {
    pub fn total(&self) -> usize {
        self.expired + self.evicted
    }
}

/// Entry lifecycle over a vector index
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Insert or replace an entry; vector and answer move together,
    /// never partially
    async fn put(&self, entry: CacheEntry) -> Result<(), DomainError>;

    /// Fetch an entry by key, expired entries included
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, DomainError>;

    /// Nearest fresh candidates, best first. Expired entries are filtered
    /// out even when the index still holds them.
    async fn search(&self, vector: &[f32], top_k: usize)
        -> Result<Vec<FreshHit>, DomainError>;

    /// Bump hit count and last-accessed time. Best effort: callers log
    /// failures and move on.
    async fn touch(&self, key: &str) -> Result<(), DomainError>;

    /// One eviction sweep: reap expired entries, then evict
    /// least-recently-used entries above the capacity ceiling (lowest hit
    /// count breaks ties), never dropping below the floor. Entries touched
    /// after the sweep began are skipped.
    async fn evict(&self) -> Result<EvictionReport, DomainError>;

    /// Number of entries currently tracked, expired included
    async fn len(&self) -> Result<usize, DomainError>;

    /// Drop every entry from the store and the index
    async fn clear(&self) -> Result<(), DomainError>;

    /// Rebuild bookkeeping from a persistent index after a restart,
    /// returning the number of entries recovered
    async fn recover(&self) -> Result<usize, DomainError>;

    /// Metric of the underlying index
    fn metric(&self) -> SimilarityMetric;

    /// Dimensionality of the underlying index
    fn dimensions(&self) -> usize;
}
