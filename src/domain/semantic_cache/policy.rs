//! Injectable hit/miss policy
//!
//! The core loop asks a policy function whether a candidate is good enough
//! to reuse. The default compares similarity against the effective
//! threshold; callers can inject their own to change hit semantics without
//! touching the engine.

use std::sync::Arc;

use crate::domain::semantic_cache::CacheEntry;

/// A scored candidate presented to the policy
#[derive(Debug)]
pub struct SimilarityCandidate<'a> {
    pub entry: &'a CacheEntry,
    pub similarity: f32,
    /// Effective threshold for this call (config or per-call override)
    pub threshold: f32,
}

/// Decides whether a candidate entry may answer the given query
pub type SimilarityPolicy =
    Arc<dyn Fn(&str, &SimilarityCandidate<'_>) -> bool + Send + Sync>;

/// The default policy: similarity at or above the effective threshold
pub fn threshold_policy() -> SimilarityPolicy {
    Arc::new(|_query, candidate| candidate.similarity >= candidate.threshold)
}
