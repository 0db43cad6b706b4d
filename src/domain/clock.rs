//! Injectable time source
//!
//! Entry freshness is decided against a `Clock` rather than `SystemTime`
//! directly so TTL behavior can be exercised in tests without sleeping.

use std::fmt::Debug;
use std::time::SystemTime;

/// Source of the current time as unix seconds
pub trait Clock: Send + Sync + Debug {
    fn now_unix_secs(&self) -> u64;
}

/// Wall-clock implementation backed by `SystemTime`
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
