//! Domain layer - core types, collaborator traits, and errors

pub mod answer;
pub mod clock;
pub mod embedding;
pub mod error;
pub mod semantic_cache;
pub mod vector_index;

pub use answer::{Answer, Answerer};
pub use clock::{Clock, SystemClock};
pub use embedding::{cosine_similarity, Embedder, SimilarityMetric};
pub use error::DomainError;
pub use semantic_cache::{
    CacheEntry, CacheOutcome, CacheStats, CacheStore, EvictionReport, FreshHit, Resolution,
    ResolveOptions, RetryConfig, SemanticCacheConfig, SimilarityCandidate, SimilarityPolicy,
};
pub use vector_index::{IndexRecord, SearchHit, VectorIndex};
