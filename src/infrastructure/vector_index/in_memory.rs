//! In-memory vector index using linear search
//!
//! Suitable for development and single-process deployments. A Redis Vector
//! Set (or any other ANN store) slots in behind the same trait for larger
//! indexes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::embedding::{similarity_score, SimilarityMetric};
use crate::domain::vector_index::{IndexRecord, SearchHit, VectorIndex};
use crate::domain::DomainError;

#[derive(Debug)]
struct StoredVector {
    vector: Vec<f32>,
    metadata: serde_json::Value,
}

/// Linear-scan vector index with interior locking
///
/// Reads never block each other; inserts and deletes take the write lock
/// for the duration of the map update only.
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    vectors: RwLock<HashMap<String, StoredVector>>,
    metric: SimilarityMetric,
    dimensions: usize,
}

impl InMemoryVectorIndex {
    pub fn new(metric: SimilarityMetric, dimensions: usize) -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
            metric,
            dimensions,
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::index(format!(
                "vector dimensionality {} does not match index dimensionality {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(
        &self,
        key: &str,
        vector: &[f32],
        metadata: serde_json::Value,
    ) -> Result<(), DomainError> {
        self.check_dimensions(vector)?;

        let mut vectors = self
            .vectors
            .write()
            .map_err(|e| DomainError::internal(format!("index lock poisoned: {}", e)))?;

        vectors.insert(
            key.to_string(),
            StoredVector {
                vector: vector.to_vec(),
                metadata,
            },
        );

        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, DomainError> {
        self.check_dimensions(vector)?;

        let vectors = self
            .vectors
            .read()
            .map_err(|e| DomainError::internal(format!("index lock poisoned: {}", e)))?;

        let mut hits: Vec<SearchHit> = vectors
            .iter()
            .map(|(key, stored)| {
                SearchHit::new(key.clone(), similarity_score(self.metric, vector, &stored.vector))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut vectors = self
            .vectors
            .write()
            .map_err(|e| DomainError::internal(format!("index lock poisoned: {}", e)))?;

        Ok(vectors.remove(key).is_some())
    }

    async fn scan(&self) -> Result<Vec<IndexRecord>, DomainError> {
        let vectors = self
            .vectors
            .read()
            .map_err(|e| DomainError::internal(format!("index lock poisoned: {}", e)))?;

        Ok(vectors
            .iter()
            .map(|(key, stored)| IndexRecord {
                key: key.clone(),
                vector: stored.vector.clone(),
                metadata: stored.metadata.clone(),
            })
            .collect())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let vectors = self
            .vectors
            .read()
            .map_err(|e| DomainError::internal(format!("index lock poisoned: {}", e)))?;

        Ok(vectors.len())
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
