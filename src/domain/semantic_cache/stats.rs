//! Cache statistics

use serde::{Deserialize, Serialize};

/// Counters for the semantic cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently tracked by the store
    pub entries: usize,
    /// Resolves served from a committed entry
    pub hits: u64,
    /// Resolves that ran the answerer
    pub misses: u64,
    /// Resolves that joined an in-flight resolution
    pub coalesced_hits: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expired_reaped: u64,
    /// Mean similarity across hits
    pub avg_hit_similarity: f32,
}

impl CacheStats {
    /// Hits (coalesced included) over all resolves
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses + self.coalesced_hits;

        if total == 0 {
            return 0.0;
        }

        (self.hits + self.coalesced_hits) as f32 / total as f32
    }
}
