//! Breaker-guarded remote access
//!
//! Every remote call goes through the circuit breaker and a timeout. An open
//! circuit skips the call: reads behave as misses, writes and deletes as
//! no-ops, and pattern deletes report that nothing was attempted. An elapsed
//! timeout is a failure like any other.

use super::provider::RemoteCacheProvider;
use super::traits::RemoteCacheService;
use crate::error::{CacheError, CacheResult};
use crate::local::CacheValue;
use crate::metrics::{self, RemoteOutcome};
use crate::resilience::{CircuitBreaker, CircuitState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GuardedRemote {
    provider: RemoteCacheProvider,
    breaker: Arc<CircuitBreaker>,
    operation_timeout: Duration,
}

impl GuardedRemote {
    pub fn new(
        provider: RemoteCacheProvider,
        breaker: Arc<CircuitBreaker>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            breaker,
            operation_timeout,
        }
    }

    /// Run `operation` if the breaker allows it, recording the outcome
    ///
    /// `None` means the call was skipped because the circuit is open.
    async fn guarded<T, Fut>(&self, op: &'static str, target: &str, operation: Fut) -> Option<CacheResult<T>>
    where
        Fut: Future<Output = CacheResult<T>>,
    {
        if !self.breaker.should_allow() {
            debug!(operation = op, target = target, "Remote circuit open, skipping call");
            metrics::record_remote_skipped(op);
            return None;
        }

        let start = Instant::now();
        let (result, outcome) = match tokio::time::timeout(self.operation_timeout, operation).await {
            Ok(Ok(value)) => (Ok(value), RemoteOutcome::Success),
            Ok(Err(e)) => (Err(e), RemoteOutcome::Failure),
            Err(_) => (
                Err(CacheError::Timeout(format!(
                    "{op} '{target}' exceeded {}ms",
                    self.operation_timeout.as_millis()
                ))),
                RemoteOutcome::Timeout,
            ),
        };
        let duration = start.elapsed();
        metrics::record_remote_call(op, outcome, duration.as_secs_f64() * 1000.0);

        match &result {
            Ok(_) => self.breaker.record_success(duration),
            Err(_) => self.breaker.record_failure(duration),
        }
        Some(result)
    }

    /// Remote read; an open circuit reads as a miss
    pub async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.guarded("GET", key, self.provider.get(key))
            .await
            .unwrap_or(Ok(None))
    }

    /// Remote write; an open circuit makes this a no-op
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.guarded("SET", key, self.provider.set(key, value, ttl))
            .await
            .unwrap_or(Ok(()))
    }

    pub async fn set_batch(&self, entries: &[(String, CacheValue)], ttl: Duration) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let target = format!("{} entries", entries.len());
        self.guarded("SET_BATCH", &target, self.provider.set_batch(entries, ttl))
            .await
            .unwrap_or(Ok(()))
    }

    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.guarded("DEL", key, self.provider.delete(key))
            .await
            .unwrap_or(Ok(()))
    }

    /// Remote pattern delete; `Ok(None)` when the circuit skipped the call
    pub async fn delete_pattern(&self, pattern: &str) -> CacheResult<Option<u64>> {
        self.guarded("DEL_PATTERN", pattern, self.provider.delete_pattern(pattern))
            .await
            .transpose()
    }

    /// Remote health probe; `Ok(None)` when the circuit skipped the call
    pub async fn health_check(&self) -> CacheResult<Option<bool>> {
        self.guarded("PING", "", self.provider.health_check())
            .await
            .transpose()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn provider(&self) -> &RemoteCacheProvider {
        &self.provider
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }
}
