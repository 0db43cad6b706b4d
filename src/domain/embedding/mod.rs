//! Embedding collaborator traits and similarity math

mod provider;
mod similarity;

pub use provider::Embedder;
pub use similarity::{cosine_similarity, inner_product, similarity_score, SimilarityMetric};

#[cfg(test)]
pub use provider::mock::MockEmbedder;
