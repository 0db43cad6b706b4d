//! Semantic cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::embedding::SimilarityMetric;
use crate::domain::DomainError;

/// Configuration for the semantic cache engine
///
/// Immutable after startup; `validate` runs in `CacheEngine::new` so bad
/// settings fail fast rather than at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Similarity threshold for cache hits (0.0 to 1.0, exclusive low end).
    /// The right value is a product-tuning decision; calibrate per domain.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Candidates fetched per lookup before the threshold decision
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidates within this distance of the top similarity take part in
    /// the freshness tie-break
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f32,

    /// Capacity ceiling; a sweep evicts least-recently-used entries above it
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Capacity floor; a sweep never evicts below it
    #[serde(default)]
    pub min_entries: usize,

    /// Default time-to-live for new entries, in seconds (0 = no expiry)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Seconds between eviction sweeps
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// Bound on queued hit-count updates; the oldest is dropped on overflow
    #[serde(default = "default_touch_queue_capacity")]
    pub touch_queue_capacity: usize,

    /// Metric shared by the embedder and the vector index
    #[serde(default)]
    pub metric: SimilarityMetric,

    /// Retry policy for transient index failures
    #[serde(default)]
    pub index_retry: RetryConfig,
}

fn default_similarity_threshold() -> f32 {
    0.90
}

fn default_top_k() -> usize {
    4
}

fn default_tie_epsilon() -> f32 {
    0.01
}

fn default_max_entries() -> usize {
    10_000
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_eviction_interval_secs() -> u64 {
    60
}

fn default_touch_queue_capacity() -> usize {
    1024
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            tie_epsilon: default_tie_epsilon(),
            max_entries: default_max_entries(),
            min_entries: 0,
            ttl_secs: default_ttl_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
            touch_queue_capacity: default_touch_queue_capacity(),
            metric: SimilarityMetric::default(),
            index_retry: RetryConfig::default(),
        }
    }
}

impl SemanticCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_tie_epsilon(mut self, epsilon: f32) -> Self {
        self.tie_epsilon = epsilon;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_min_entries(mut self, min: usize) -> Self {
        self.min_entries = min;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval_secs = interval.as_secs();
        self
    }

    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_index_retry(mut self, retry: RetryConfig) -> Self {
        self.index_retry = retry;
        self
    }

    /// Default TTL as a `Duration`; `None` when entries never expire
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(DomainError::configuration(format!(
                "similarity_threshold must be in (0.0, 1.0], got {}",
                self.similarity_threshold
            )));
        }

        if self.top_k == 0 {
            return Err(DomainError::configuration("top_k must be at least 1"));
        }

        if self.tie_epsilon < 0.0 {
            return Err(DomainError::configuration(format!(
                "tie_epsilon must be non-negative, got {}",
                self.tie_epsilon
            )));
        }

        if self.max_entries == 0 {
            return Err(DomainError::configuration("max_entries must be at least 1"));
        }

        if self.min_entries > self.max_entries {
            return Err(DomainError::configuration(format!(
                "min_entries ({}) exceeds max_entries ({})",
                self.min_entries, self.max_entries
            )));
        }

        if self.eviction_interval_secs == 0 {
            return Err(DomainError::configuration(
                "eviction_interval_secs must be at least 1",
            ));
        }

        if self.touch_queue_capacity == 0 {
            return Err(DomainError::configuration(
                "touch_queue_capacity must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Retry policy with exponential backoff for transient index failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay_ms: 50,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }
}
