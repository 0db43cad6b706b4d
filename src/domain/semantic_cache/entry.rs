//! Cache entry model

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::answer::Answer;

/// A committed cache entry
///
/// The key identifies exactly one vector and one answer at any instant; an
/// update replaces the whole entry under the store's write lock, never a
/// part of it. Entries are serialized into the vector index's metadata slot
/// so bookkeeping survives a restart whenever the index does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique identifier for this entry
    key: String,
    /// Embedding of the canonical query this entry answers
    vector: Vec<f32>,
    /// The canonical query text, kept for observability
    query_text: String,
    /// The stored expensive result
    answer: Answer,
    /// Unix seconds at creation
    created_at: u64,
    /// Unix seconds of the most recent hit
    last_accessed_at: u64,
    /// Monotone non-decreasing while the entry is alive
    hit_count: u64,
    /// Optional expiry; `None` means the entry never expires
    ttl_secs: Option<u64>,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        vector: Vec<f32>,
        query_text: impl Into<String>,
        answer: Answer,
        ttl: Option<Duration>,
        now: u64,
    ) -> Self {
        Self {
            key: key.into(),
            vector,
            query_text: query_text.into(),
            answer,
            created_at: now,
            last_accessed_at: now,
            hit_count: 0,
            ttl_secs: ttl.map(|t| t.as_secs()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> u64 {
        self.last_accessed_at
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    /// Logically dead once `now` passes `created_at + ttl`. A dead entry
    /// must never be returned as a hit, though it may occupy storage until
    /// the next eviction sweep reaps it.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.ttl_secs {
            Some(ttl) => now > self.created_at.saturating_add(ttl),
            None => false,
        }
    }

    /// Seconds until expiry; `None` for entries without a TTL
    pub fn ttl_remaining(&self, now: u64) -> Option<u64> {
        self.ttl_secs
            .map(|ttl| self.created_at.saturating_add(ttl).saturating_sub(now))
    }

    /// Record a hit
    pub fn touch(&mut self, now: u64) {
        self.hit_count += 1;
        self.last_accessed_at = now;
    }
}
