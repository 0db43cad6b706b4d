//! Per-call resolve options

use std::time::Duration;

/// Options carried by a single resolve call
///
/// Overrides apply to this call only; the engine's configuration is never
/// mutated after startup.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Similarity threshold for this call, overriding the configured one
    pub threshold_override: Option<f32>,
    /// TTL for an entry created by this call, overriding the configured one
    pub ttl_override: Option<Duration>,
    /// Give up waiting after this long. The underlying answer generation
    /// keeps running and is still committed to the cache.
    pub timeout: Option<Duration>,
    /// Supporting context handed to the answerer on a miss
    pub context: Option<String>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold_override = Some(threshold);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
