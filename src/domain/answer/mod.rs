//! Answer generation collaborator
//!
//! The answerer produces the true (expensive) result for a query on a cache
//! miss. It may take seconds; the engine runs it in a detached task so the
//! cache is populated even if every caller gives up waiting.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// The stored expensive result for a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Opaque answer payload
    payload: String,
    /// Model that produced the answer, if known
    model_id: Option<String>,
    /// Additional metadata (source chunks, token usage, ...)
    metadata: Option<serde_json::Value>,
}

impl Answer {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            model_id: None,
            metadata: None,
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }
}

/// Trait for answer generators (LLM-backed in production)
#[async_trait]
pub trait Answerer: Send + Sync + Debug {
    /// Generate the answer for a query, with optional supporting context
    async fn generate(&self, query: &str, context: Option<&str>)
        -> Result<Answer, DomainError>;

    /// Generator name for logging
    fn name(&self) -> &'static str;
}


#[cfg(test)]
mod tests {
    use super::mock::MockAnswerer;
    use super::*;

    #[test]
    fn test_answer_builder() {
        let answer = Answer::new("Paris")
            .with_model_id("gpt-4")
            .with_metadata(serde_json::json!({"source": "geography.pdf"}));

        assert_eq!(answer.payload(), "Paris");
        assert_eq!(answer.model_id(), Some("gpt-4"));
        assert!(answer.metadata().is_some());
    }

    #[test]
    fn test_answer_round_trips_through_json() {
        let answer = Answer::new("42").with_model_id("mock-model");

        let json = serde_json::to_string(&answer).unwrap();
        let restored: Answer = serde_json::from_str(&json).unwrap();

        assert_eq!(answer, restored);
    }

    #[tokio::test]
    async fn test_mock_answerer_counts_invocations() {
        let answerer = MockAnswerer::new("fallback").with_response("q1", "a1");

        let answer = answerer.generate("q1", None).await.unwrap();
        assert_eq!(answer.payload(), "a1");

        let answer = answerer.generate("unknown", None).await.unwrap();
        assert_eq!(answer.payload(), "fallback");

        assert_eq!(answerer.invocation_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_answerer_error() {
        let answerer = MockAnswerer::new("x").with_error("model overloaded");

        let result = answerer.generate("q", None).await;
        assert!(matches!(result, Err(DomainError::Answerer { .. })));
        assert_eq!(answerer.invocation_count(), 1);
    }
}
