//! Resolution outcomes

use serde::{Deserialize, Serialize};

use crate::domain::answer::Answer;

/// How a resolve call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheOutcome {
    /// A committed entry was similar enough to reuse
    Hit { similarity: f32 },
    /// This call ran the answerer and populated the cache
    Miss,
    /// This call joined an in-flight resolution for the same fingerprint
    CoalescedHit,
}

impl CacheOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    /// Label for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::Miss => "miss",
            Self::CoalescedHit => "coalesced_hit",
        }
    }
}

/// Result of a resolve call: the answer plus how it was obtained
#[derive(Debug, Clone)]
pub struct Resolution {
    pub answer: Answer,
    pub outcome: CacheOutcome,
}

impl Resolution {
    pub fn new(answer: Answer, outcome: CacheOutcome) -> Self {
        Self { answer, outcome }
    }
}
