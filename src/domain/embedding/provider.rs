//! Embedder trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Trait for embedding providers (OpenAI, sentence-transformers, etc.)
///
/// Implementations should be deterministic for identical input; if a
/// provider is not, coalescing fingerprints degrade to redundant work but
/// never to incorrect answers.
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Embed a query or document chunk into a fixed-dimension vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Output dimensionality, fixed for the lifetime of the provider
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
