//! In-process remote provider
//!
//! A `DashMap`-backed stand-in for a distributed cache. Clones share one
//! store, so several engines in the same process see each other's writes the
//! way they would through Redis. TTLs are truncated to whole seconds like a
//! real backend would see them.

use crate::error::CacheResult;
use crate::remote::glob::GlobPattern;
use crate::remote::traits::{ttl_seconds, RemoteCacheService};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCacheService {
    entries: Arc<DashMap<String, StoredValue>>,
}

impl MemoryCacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries (expired ones are purged first)
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, v| v.expires_at > now);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a live key
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|v| v.expires_at > now)
            .map(|v| v.expires_at - now)
    }

    fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds(ttl));
        self.entries
            .insert(key.to_string(), StoredValue { value, expires_at });
    }
}

#[async_trait]
impl RemoteCacheService for MemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(v) if v.expires_at > now => Some(v.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if hit.is_none() {
            self.entries.remove_if(key, |_, v| v.expires_at <= now);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.insert(key, value.to_vec(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let glob = GlobPattern::new(pattern)?;
        let now = Instant::now();
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| glob.matches(e.key()))
            .map(|e| e.key().clone())
            .collect();

        let mut deleted = 0;
        for key in keys {
            if let Some((_, v)) = self.entries.remove(&key) {
                if v.expires_at > now {
                    deleted += 1;
                }
            }
        }
        debug!(pattern = pattern, deleted = deleted, "Memory cache pattern DEL");
        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_values_expire_in_whole_seconds() {
        let svc = MemoryCacheService::new();
        svc.set("loan:1", b"v", Duration::from_millis(1500))
            .await
            .unwrap();
        assert_eq!(svc.remaining_ttl("loan:1"), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(svc.get("loan:1").await.unwrap(), None);
        assert!(svc.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = MemoryCacheService::new();
        let b = a.clone();
        a.set("loan:1", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(b.get("loan:1").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_pattern_counts_live_matches() {
        let svc = MemoryCacheService::new();
        for key in ["loan:1", "loan:2", "payment:1"] {
            svc.set(key, b"v", Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(svc.delete_pattern("loan:*").await.unwrap(), 2);
        assert_eq!(svc.len(), 1);
        assert!(svc.delete_pattern("loan:[").await.is_err());
    }
}
