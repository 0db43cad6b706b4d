use thiserror::Error;

/// Core domain errors
///
/// `Clone` is required because a single in-flight resolution fans its
/// outcome out to every coalesced waiter.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Index error: {message}")]
    Index { message: String, transient: bool },

    #[error("Answerer error: {message}")]
    Answerer { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Timed out after {millis}ms waiting for resolution")]
    Timeout { millis: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
            transient: false,
        }
    }

    /// An index failure worth retrying (network-style blips)
    pub fn index_transient(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
            transient: true,
        }
    }

    pub fn answerer(message: impl Into<String>) -> Self {
        Self::Answerer {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn timeout(millis: u64) -> Self {
        Self::Timeout { millis }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Index { transient: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error() {
        let error = DomainError::embedding("dimension mismatch: expected 384, got 128");
        assert_eq!(
            error.to_string(),
            "Embedding error: dimension mismatch: expected 384, got 128"
        );
        assert!(!error.is_transient());
    }

    #[test]
    fn test_transient_index_error() {
        let error = DomainError::index_transient("connection reset");
        assert!(error.is_transient());

        let error = DomainError::index("malformed vector");
        assert!(!error.is_transient());
    }

    #[test]
    fn test_answerer_error_is_cloneable() {
        let error = DomainError::answerer("upstream model unavailable");
        let cloned = error.clone();
        assert_eq!(error.to_string(), cloned.to_string());
    }

    #[test]
    fn test_timeout_error() {
        let error = DomainError::timeout(1500);
        assert_eq!(
            error.to_string(),
            "Timed out after 1500ms waiting for resolution"
        );
    }
}
