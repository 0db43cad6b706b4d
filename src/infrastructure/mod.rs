//! Infrastructure layer - concrete implementations of the domain traits

pub mod observability;
pub mod semantic_cache;
pub mod vector_index;

pub use semantic_cache::{CacheEngine, VectorCacheStore};
pub use vector_index::InMemoryVectorIndex;
