//! Semantic cache domain models and traits
//!
//! Vector-based caching that matches semantically similar queries rather
//! than requiring exact key matches.

mod config;
mod entry;
mod options;
mod outcome;
mod policy;
mod stats;
mod store;

pub use config::{RetryConfig, SemanticCacheConfig};
pub use entry::CacheEntry;
pub use options::ResolveOptions;
pub use outcome::{CacheOutcome, Resolution};
pub use policy::{threshold_policy, SimilarityCandidate, SimilarityPolicy};
pub use stats::CacheStats;
pub use store::{CacheStore, EvictionReport, FreshHit};
