//! Documind semantic cache engine
//!
//! Answers to expensive queries (LLM calls, retrieval pipelines) are cached
//! by meaning rather than by exact text: an incoming query is embedded, the
//! vector index is searched, and a stored answer is reused when it is
//! similar enough. Concurrent misses for near-identical queries coalesce
//! into a single answer generation.
//!
//! The engine is built against three collaborator traits the host supplies:
//! [`domain::Embedder`], [`domain::Answerer`], and [`domain::VectorIndex`].
//! An in-memory index suitable for moderate cache sizes ships in
//! [`infrastructure::vector_index`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use documind_cache::config::AppConfig;
//! use documind_cache::domain::{ResolveOptions, SystemClock};
//! use documind_cache::infrastructure::{CacheEngine, InMemoryVectorIndex, VectorCacheStore};
//!
//! # async fn example(
//! #     embedder: Arc<dyn documind_cache::domain::Embedder>,
//! #     answerer: Arc<dyn documind_cache::domain::Answerer>,
//! # ) -> Result<(), documind_cache::domain::DomainError> {
//! let config = AppConfig::default().cache;
//! let clock = Arc::new(SystemClock::new());
//! let index = Arc::new(InMemoryVectorIndex::new(config.metric, embedder.dimensions()));
//! let store = Arc::new(VectorCacheStore::new(index, clock.clone(), &config));
//!
//! let engine = CacheEngine::new(config, embedder, answerer, store, clock)?;
//! let resolution = engine.resolve("What is the capital of France?", ResolveOptions::new()).await?;
//! println!("{} ({:?})", resolution.answer.payload(), resolution.outcome);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    Answer, Answerer, CacheOutcome, CacheStats, CacheStore, Clock, DomainError, Embedder,
    Resolution, ResolveOptions, SemanticCacheConfig, VectorIndex,
};
pub use infrastructure::{CacheEngine, InMemoryVectorIndex, VectorCacheStore};
