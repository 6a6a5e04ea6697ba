//! Remote cache service trait

use crate::error::CacheResult;
use crate::local::CacheValue;
use async_trait::async_trait;
use std::time::Duration;

/// Operations the engine needs from a distributed (L2) cache
///
/// Implemented by the bundled providers and by caller-supplied clients
/// plugged in through `RemoteCacheProvider::Custom`. TTLs are expressed to
/// the backend in whole seconds, never less than one.
#[async_trait]
pub trait RemoteCacheService: Send + Sync {
    /// `Ok(Some(bytes))` on hit, `Ok(None)` on miss
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Write several entries with one TTL
    ///
    /// Backends that can pipeline should override this; the default issues
    /// one `set` per entry and stops at the first failure.
    async fn set_batch(&self, entries: &[(String, CacheValue)], ttl: Duration) -> CacheResult<()> {
        for (key, value) in entries {
            self.set(key, value, ttl).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a Redis-style glob, returning how many went
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    async fn health_check(&self) -> CacheResult<bool>;

    fn provider_name(&self) -> &'static str;
}

/// Whole-second TTL as sent to remote backends
pub fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_seconds_floor_is_one() {
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::from_millis(2500)), 2);
        assert_eq!(ttl_seconds(Duration::from_secs(7200)), 7200);
    }
}
