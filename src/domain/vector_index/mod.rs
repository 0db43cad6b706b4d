//! Vector index collaborator
//!
//! The similarity-search-capable store the cache sits on top of. The
//! canonical in-process implementation lives in
//! `infrastructure::vector_index`; a Redis-Vector-Set-backed index is a
//! drop-in replacement behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::domain::embedding::SimilarityMetric;
use crate::domain::DomainError;

/// A single nearest-neighbor match, nearest first in search output
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub similarity: f32,
}

impl SearchHit {
    pub fn new(key: impl Into<String>, similarity: f32) -> Self {
        Self {
            key: key.into(),
            similarity,
        }
    }
}

/// A stored record, as returned by a full scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// Approximate nearest-neighbor store keyed by vector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector and metadata stored under `key`
    async fn insert(
        &self,
        key: &str,
        vector: &[f32],
        metadata: serde_json::Value,
    ) -> Result<(), DomainError>;

    /// Nearest neighbors to `vector`, best first, at most `top_k` results
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, DomainError>;

    /// Delete by key, returning whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Every stored record; used to recover bookkeeping after a restart
    /// when the index itself is persistent
    async fn scan(&self) -> Result<Vec<IndexRecord>, DomainError>;

    /// Number of stored vectors
    async fn len(&self) -> Result<usize, DomainError>;

    /// The metric this index natively optimizes for
    fn metric(&self) -> SimilarityMetric;

    /// Dimensionality accepted by this index
    fn dimensions(&self) -> usize;
}
