//! Semantic cache infrastructure - decision engine and vector-backed store

mod engine;
mod fingerprint;
mod store;

pub use engine::CacheEngine;
pub use fingerprint::fingerprint;
pub use store::VectorCacheStore;
