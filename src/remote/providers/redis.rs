//! Redis remote provider
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections
//! with automatic reconnection. Also serves Dragonfly, which speaks the same
//! protocol. Requires the `cache-redis` feature flag.

use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};
use crate::local::CacheValue;
use crate::remote::traits::{ttl_seconds, RemoteCacheService};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Keys fetched per `SCAN` round trip during pattern deletes
const SCAN_COUNT: usize = 100;

#[derive(Clone)]
pub struct RedisCacheService {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheService {
    pub async fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        debug!(url = %redact_url(&config.url), "Redis cache service connected");

        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl RemoteCacheService for RedisCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        let result: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GET failed: {}", e)))?;

        debug!(key = key, hit = result.is_some(), "Redis GET");
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl_seconds(ttl);

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis SETEX failed: {}", e)))?;

        debug!(key = key, ttl_seconds = ttl_seconds, "Redis SETEX");
        Ok(())
    }

    async fn set_batch(&self, entries: &[(String, CacheValue)], ttl: Duration) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl_seconds(ttl);

        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.cmd("SETEX")
                .arg(key)
                .arg(ttl_seconds)
                .arg(&value[..])
                .ignore();
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis pipelined SETEX failed: {}", e)))?;

        debug!(
            entries = entries.len(),
            ttl_seconds = ttl_seconds,
            "Redis batch SETEX"
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis DEL failed: {}", e)))?;

        debug!(key = key, "Redis DEL");
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection_manager.clone();
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::BackendError(format!("Redis SCAN failed: {}", e)))?;

            if !keys.is_empty() {
                let count: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| {
                        CacheError::BackendError(format!("Redis DEL (batch) failed: {}", e))
                    })?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = pattern, deleted = deleted, "Redis pattern DEL");
        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

/// Redact the password from a Redis URL for logging
pub(crate) fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let prefix = &url[..=colon_pos];
            let suffix = &url[at_pos..];
            return format!("{}***{}", prefix, suffix);
        }
    }
    url.to_string()
}
