//! Remote cache provider
//!
//! Enum dispatch over the bundled backends plus a `Custom` escape hatch for
//! caller-supplied clients. Construction from configuration never fails: a
//! backend that cannot be built degrades to `NoOp` with a warning, and the
//! engine keeps working from the local tier.

use super::providers::{MemoryCacheService, NoOpCacheService};
use super::traits::RemoteCacheService;
use crate::config::RemoteConfig;
use crate::constants::backends;
use crate::error::CacheResult;
use crate::local::CacheValue;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

#[derive(Clone)]
pub enum RemoteCacheProvider {
    /// In-process shared store (single node, tests)
    Memory(MemoryCacheService),

    /// Always miss, always succeed
    NoOp(NoOpCacheService),

    /// Redis or Dragonfly (boxed to keep the enum small)
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),

    /// Caller-supplied client
    Custom(Arc<dyn RemoteCacheService>),
}

impl std::fmt::Debug for RemoteCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RemoteCacheProvider")
            .field(&self.provider_name())
            .finish()
    }
}

impl RemoteCacheProvider {
    /// Build the configured backend, falling back to `NoOp` on any failure
    pub async fn from_config_graceful(config: &RemoteConfig) -> Self {
        match config.backend.to_ascii_lowercase().as_str() {
            backends::MEMORY => {
                info!(backend = "memory", "In-process remote cache initialized");
                Self::memory()
            }
            backends::NOOP => {
                info!("Remote cache disabled by configuration");
                Self::noop()
            }
            backends::REDIS | backends::DRAGONFLY => Self::create_redis_backend(config).await,
            other => {
                warn!(backend = other, "Unknown remote cache backend, falling back to NoOp");
                Self::noop()
            }
        }
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis_backend(config: &RemoteConfig) -> Self {
        let redis_config = config.redis.clone().unwrap_or_default();

        match RedisCacheService::from_config(&redis_config).await {
            Ok(service) => {
                info!(
                    backend = %config.backend,
                    "Distributed cache provider initialized successfully"
                );
                Self::Redis(Box::new(service))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp remote cache"
                );
                Self::noop()
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis_backend(_config: &RemoteConfig) -> Self {
        warn!("Redis backend requested but 'cache-redis' feature not enabled, using NoOp");
        Self::noop()
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryCacheService::new())
    }

    pub fn noop() -> Self {
        Self::NoOp(NoOpCacheService::new())
    }

    pub fn custom(service: Arc<dyn RemoteCacheService>) -> Self {
        Self::Custom(service)
    }

    /// Whether a real backend is configured
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    fn service(&self) -> &dyn RemoteCacheService {
        match self {
            Self::Memory(s) => s,
            Self::NoOp(s) => s,
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.as_ref(),
            Self::Custom(s) => s.as_ref(),
        }
    }
}

#[async_trait]
impl RemoteCacheService for RemoteCacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.service().get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.service().set(key, value, ttl).await
    }

    async fn set_batch(&self, entries: &[(String, CacheValue)], ttl: Duration) -> CacheResult<()> {
        self.service().set_batch(entries, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.service().delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.service().delete_pattern(pattern).await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.service().health_check().await
    }

    fn provider_name(&self) -> &'static str {
        self.service().provider_name()
    }
}
