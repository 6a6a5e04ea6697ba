//! Local cache entries

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Opaque cached payload, shared between the store and readers
pub type CacheValue = Arc<[u8]>;

/// An immutable value with its expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: CacheValue,
    pub written_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create an entry written at `now`; `ttl` must be non-zero
    pub(crate) fn new(value: CacheValue, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            written_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
