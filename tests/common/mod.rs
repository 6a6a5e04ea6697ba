//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiercache_core::config::{CacheEngineConfig, NamespacePolicyConfig};
use tiercache_core::error::{CacheError, CacheResult};
use tiercache_core::remote::{MemoryCacheService, RemoteCacheProvider, RemoteCacheService};
use tiercache_core::CacheEngine;

/// Remote backend whose behaviour can be switched at runtime
///
/// Backed by a real in-memory store; `fail` makes every call return a
/// connection error and `hang` makes every call sleep past any timeout.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    store: MemoryCacheService,
    fail: AtomicBool,
    hang: AtomicBool,
    pub gets: AtomicU64,
    pub sets: AtomicU64,
    pub deletes: AtomicU64,
    pub pattern_deletes: AtomicU64,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hang.store(hanging, Ordering::SeqCst);
    }

    /// The backing store, bypassing scripted failures
    pub fn store(&self) -> &MemoryCacheService {
        &self.store
    }

    pub fn calls(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
            + self.sets.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.pattern_deletes.load(Ordering::SeqCst)
    }

    async fn script(&self, counter: &AtomicU64) -> CacheResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCacheService for ScriptedRemote {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.script(&self.gets).await?;
        self.store.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.script(&self.sets).await?;
        self.store.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.script(&self.deletes).await?;
        self.store.delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.script(&self.pattern_deletes).await?;
        self.store.delete_pattern(pattern).await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("scripted failure".to_string()));
        }
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Small namespace table used across tests
pub fn test_namespaces() -> Vec<NamespacePolicyConfig> {
    vec![
        NamespacePolicyConfig::new("profile", 3, 60, 300),
        NamespacePolicyConfig::new("loan", 100, 600, 1200),
        NamespacePolicyConfig::new("token", 100, 1, 5),
    ]
}

pub fn test_config() -> CacheEngineConfig {
    CacheEngineConfig::for_test().with_namespaces(test_namespaces())
}

/// Engine over a scripted remote
pub fn scripted_engine() -> (CacheEngine, Arc<ScriptedRemote>) {
    let remote = ScriptedRemote::new();
    let engine = CacheEngine::new(
        test_config(),
        RemoteCacheProvider::custom(remote.clone()),
    )
    .expect("test config is valid");
    (engine, remote)
}

/// Engine over the in-memory remote
pub fn memory_engine() -> CacheEngine {
    CacheEngine::new(test_config(), RemoteCacheProvider::memory()).expect("test config is valid")
}

/// Loader that always returns `value` and counts its invocations
pub fn counting_loader(
    calls: &Arc<AtomicU64>,
    value: &'static [u8],
) -> impl FnOnce(&str) -> std::future::Ready<Result<Option<Vec<u8>>, String>> {
    let calls = Arc::clone(calls);
    move |_id: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(Some(value.to_vec())))
    }
}
