//! # Cache Engine
//!
//! Façade over the two cache tiers. Reads go L1 → L2 → loader, writes
//! populate both tiers, and invalidations fan out to both. The engine owns
//! the local store, the circuit breaker, the group registry and the
//! statistics; the remote tier is shared with other processes.
//!
//! ## Failure semantics
//!
//! - Remote failures never fail a read or write. They are counted as
//!   errors, logged, and may open the circuit.
//! - Loader failures are returned untouched as [`LoadError::Loader`].
//! - Local-tier rejections (unknown namespace, invalid TTL) are returned as
//!   [`CacheError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tiercache_core::config::CacheEngineConfig;
//! use tiercache_core::engine::CacheEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CacheEngine::from_config(CacheEngineConfig::default()).await?;
//!
//! let profile = engine
//!     .get_or_load("profile", "customer-42", |id| {
//!         let id = id.to_string();
//!         async move { Ok::<_, std::io::Error>(Some(format!("profile of {id}").into_bytes())) }
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod maintenance;
pub mod typed;

pub use maintenance::{CacheWarmer, MaintenanceHandle, MaintenanceReport, MaintenanceTask, WarmingBatch};
pub use typed::{JsonCodec, ValueCodec};

use crate::config::CacheEngineConfig;
use crate::error::{CacheError, CacheResult, LoadError};
use crate::groups::GroupRegistry;
use crate::key::CacheKey;
use crate::local::{CacheValue, LocalStore};
use crate::log_cache_operation;
use crate::metrics;
use crate::policy::{NamespacePolicy, PolicyTable};
use crate::remote::{glob, GlobPattern, GuardedRemote, RemoteCacheProvider};
use crate::resilience::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
use crate::stats::{CacheStatistics, StatisticsSnapshot};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-call read options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Skip the local tier on read, and do not populate it from a remote hit
    pub bypass_local: bool,
}

impl ReadOptions {
    pub fn bypass_local() -> Self {
        Self { bypass_local: true }
    }
}

/// Where the count of a pattern invalidation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSource {
    /// Keys the remote tier reported deleting
    Remote,
    /// Remote delete skipped or failed; local removals only, a lower bound
    LocalEstimate,
}

/// Outcome of `invalidate_by_pattern`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternInvalidation {
    /// Recorded invalidation count, see `source`
    pub count: u64,
    pub source: CountSource,
    /// Entries removed from the local tier
    pub local_removed: u64,
}

/// Point-in-time health of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHealthStatus {
    pub engine_id: Uuid,
    pub remote_provider: String,
    pub local_entries: usize,
    pub local_capacity: usize,
    pub circuit_state: CircuitState,
    pub hit_rate: f64,
    pub total_operations: u64,
    pub healthy: bool,
}

/// Multi-level cache engine
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    engine_id: Uuid,
    config: CacheEngineConfig,
    policies: PolicyTable,
    local: LocalStore,
    remote: GuardedRemote,
    groups: GroupRegistry,
    stats: CacheStatistics,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("engine_id", &self.inner.engine_id)
            .field("remote", &self.inner.remote.provider_name())
            .field("circuit_state", &self.inner.remote.circuit_state())
            .field("local", &self.inner.local)
            .finish()
    }
}

impl CacheEngine {
    /// Build an engine over an already-constructed remote provider
    pub fn new(config: CacheEngineConfig, provider: RemoteCacheProvider) -> CacheResult<Self> {
        config.validate()?;
        let policies = PolicyTable::from_config(&config.namespaces)?;
        let local = LocalStore::new(&policies);

        let breaker = Arc::new(CircuitBreaker::new(
            "remote_cache".to_string(),
            config.circuit_breaker.to_resilience_config(),
        ));
        let remote = GuardedRemote::new(provider, breaker, config.remote.operation_timeout());

        let engine_id = Uuid::new_v4();
        info!(
            engine_id = %engine_id,
            namespaces = policies.len(),
            local_capacity = local.capacity(),
            remote = remote.provider_name(),
            "Cache engine initialized"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                engine_id,
                config,
                policies,
                local,
                remote,
                groups: GroupRegistry::new(),
                stats: CacheStatistics::new(),
            }),
        })
    }

    /// Build an engine and its remote provider from configuration
    ///
    /// An unreachable remote backend degrades to no remote tier rather than
    /// failing.
    pub async fn from_config(config: CacheEngineConfig) -> CacheResult<Self> {
        config.validate()?;
        let provider = RemoteCacheProvider::from_config_graceful(&config.remote).await;
        Self::new(config, provider)
    }

    pub fn engine_id(&self) -> Uuid {
        self.inner.engine_id
    }

    pub fn config(&self) -> &CacheEngineConfig {
        &self.inner.config
    }

    /// Policy for `namespace`
    pub fn policy(&self, namespace: &str) -> CacheResult<&NamespacePolicy> {
        self.inner.policies.resolve(namespace)
    }

    /// Fail if any of `namespaces` is not configured
    pub fn ensure_namespaces<S: AsRef<str>>(&self, namespaces: &[S]) -> CacheResult<()> {
        self.inner.policies.ensure_known(namespaces)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read-through lookup
    ///
    /// `loader` receives the identifier and is only invoked on a miss in both
    /// tiers. A loaded value is written to the remote tier and then the local
    /// tier; an absent result is not cached.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        namespace: &str,
        id: &str,
        loader: F,
    ) -> Result<Option<CacheValue>, LoadError<E>>
    where
        F: FnOnce(&str) -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>, E>>,
    {
        self.get_or_load_with(namespace, id, ReadOptions::default(), loader)
            .await
    }

    /// Read-through lookup with per-call options
    pub async fn get_or_load_with<F, Fut, E>(
        &self,
        namespace: &str,
        id: &str,
        options: ReadOptions,
        loader: F,
    ) -> Result<Option<CacheValue>, LoadError<E>>
    where
        F: FnOnce(&str) -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>, E>>,
    {
        let policy = self.inner.policies.resolve(namespace)?.clone();
        let key = CacheKey::new(namespace, id);

        if let Some(value) = self.lookup(&key, &policy, options).await? {
            return Ok(Some(value));
        }

        self.inner.stats.record_miss();
        debug!(key = %key, "Cache miss, invoking loader");

        let Some(bytes) = loader(id).await.map_err(LoadError::Loader)? else {
            return Ok(None);
        };
        let value: CacheValue = Arc::from(bytes);
        self.write_through(key, value.clone(), &policy).await?;
        Ok(Some(value))
    }

    /// Read-through lookup bounded by `timeout`
    ///
    /// On expiry the in-flight loader is dropped. A write-through that had
    /// already started still completes in the background.
    pub async fn get_or_load_with_timeout<F, Fut, E>(
        &self,
        namespace: &str,
        id: &str,
        timeout: Duration,
        loader: F,
    ) -> Result<Option<CacheValue>, LoadError<E>>
    where
        F: FnOnce(&str) -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>, E>>,
    {
        match tokio::time::timeout(timeout, self.get_or_load(namespace, id, loader)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(namespace = namespace, id = id, timeout_ms = timeout.as_millis() as u64, "Cache lookup timed out");
                Err(LoadError::TimedOut {
                    key: CacheKey::new(namespace, id).into_string(),
                    timeout,
                })
            }
        }
    }

    /// Lookup without a loader: L1, then L2
    pub async fn get(&self, namespace: &str, id: &str) -> CacheResult<Option<CacheValue>> {
        self.get_with(namespace, id, ReadOptions::default()).await
    }

    pub async fn get_with(
        &self,
        namespace: &str,
        id: &str,
        options: ReadOptions,
    ) -> CacheResult<Option<CacheValue>> {
        let policy = self.inner.policies.resolve(namespace)?.clone();
        let key = CacheKey::new(namespace, id);

        let found = self.lookup(&key, &policy, options).await?;
        if found.is_none() {
            self.inner.stats.record_miss();
        }
        Ok(found)
    }

    /// L1 then L2, recording hits; misses are left to the caller
    async fn lookup(
        &self,
        key: &CacheKey,
        policy: &NamespacePolicy,
        options: ReadOptions,
    ) -> CacheResult<Option<CacheValue>> {
        if !options.bypass_local {
            if let Some(value) = self.inner.local.get(key.as_str()) {
                self.inner.stats.record_l1_hit();
                return Ok(Some(value));
            }
        }

        let Some(bytes) = self.remote_get(key).await else {
            return Ok(None);
        };
        self.inner.stats.record_l2_hit();
        let value: CacheValue = Arc::from(bytes);
        if !options.bypass_local {
            self.inner
                .populate_local(key.as_str(), value.clone(), policy.local_ttl)?;
        }
        Ok(Some(value))
    }

    /// Remote read with failures absorbed
    pub(crate) async fn remote_get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.inner.remote.get(key.as_str()).await {
            Ok(found) => found,
            Err(e) => {
                self.inner.record_remote_error("get", key.as_str(), &e);
                None
            }
        }
    }

    /// Write a freshly loaded value to L2 then L1
    ///
    /// Runs on its own task so a caller that stops waiting (timeout, dropped
    /// future) does not abandon a write that has already been dispatched.
    pub(crate) async fn write_through(
        &self,
        key: CacheKey,
        value: CacheValue,
        policy: &NamespacePolicy,
    ) -> CacheResult<()> {
        let inner = Arc::clone(&self.inner);
        let local_ttl = policy.local_ttl;
        let remote_ttl = policy.remote_ttl;

        let handle = tokio::spawn(async move {
            if let Err(e) = inner.remote.set(key.as_str(), &value, remote_ttl).await {
                inner.record_remote_error("set", key.as_str(), &e);
            }
            inner.populate_local(key.as_str(), value, local_ttl)?;
            inner.groups.touch(key.as_str(), Instant::now() + remote_ttl);
            inner.stats.record_write();
            Ok::<(), CacheError>(())
        });

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(CacheError::Internal(format!("write-through task failed: {e}"))),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a value in both tiers, optionally enrolling it in a group
    ///
    /// The local write always happens; the remote write is subject to the
    /// circuit breaker.
    pub async fn put(
        &self,
        namespace: &str,
        id: &str,
        value: impl Into<CacheValue>,
        group: Option<&str>,
    ) -> CacheResult<()> {
        let policy = self.inner.policies.resolve(namespace)?;
        let key = CacheKey::new(namespace, id);
        let value = value.into();

        self.inner
            .populate_local(key.as_str(), value.clone(), policy.local_ttl)?;
        if let Err(e) = self
            .inner
            .remote
            .set(key.as_str(), &value, policy.remote_ttl)
            .await
        {
            self.inner.record_remote_error("set", key.as_str(), &e);
        }
        self.inner.stats.record_write();

        let live_until = Instant::now() + policy.remote_ttl;
        match group {
            Some(group) => {
                self.inner.groups.add_to_group(group, key.as_str(), live_until);
            }
            None => self.inner.groups.touch(key.as_str(), live_until),
        }
        Ok(())
    }

    /// Store several values of one namespace with a single remote batch call
    ///
    /// Returns the number of entries written.
    pub async fn put_batch<I, V>(&self, namespace: &str, entries: I) -> CacheResult<usize>
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<CacheValue>,
    {
        let policy = self.inner.policies.resolve(namespace)?;
        let remote_ttl = policy.remote_ttl;
        self.store_batch(namespace, entries, remote_ttl).await
    }

    /// Pre-populate both tiers
    ///
    /// Like `put_batch`, but the remote TTL is at least the configured warming
    /// TTL so warmed data outlives ordinary writes.
    pub async fn warm<I, V>(&self, namespace: &str, entries: I) -> CacheResult<usize>
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<CacheValue>,
    {
        let policy = self.inner.policies.resolve(namespace)?;
        let remote_ttl = policy
            .remote_ttl
            .max(self.inner.config.warming.remote_ttl());
        let written = self.store_batch(namespace, entries, remote_ttl).await?;

        log_cache_operation!(
            info,
            "warm",
            engine_id: self.inner.engine_id,
            namespace: namespace,
            entries: written,
            remote_ttl_seconds: remote_ttl.as_secs()
        );
        Ok(written)
    }

    async fn store_batch<I, V>(
        &self,
        namespace: &str,
        entries: I,
        remote_ttl: Duration,
    ) -> CacheResult<usize>
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<CacheValue>,
    {
        let local_ttl = self.inner.policies.resolve(namespace)?.local_ttl;
        let batch: Vec<(String, CacheValue)> = entries
            .into_iter()
            .map(|(id, value)| (CacheKey::new(namespace, &id).into_string(), value.into()))
            .collect();
        if batch.is_empty() {
            return Ok(0);
        }

        for (key, value) in &batch {
            self.inner.populate_local(key, value.clone(), local_ttl)?;
        }
        if let Err(e) = self.inner.remote.set_batch(&batch, remote_ttl).await {
            self.inner.record_remote_error("set_batch", namespace, &e);
        }
        let live_until = Instant::now() + remote_ttl;
        for (key, _) in &batch {
            self.inner.groups.touch(key, live_until);
        }
        self.inner.stats.record_writes(batch.len() as u64);
        Ok(batch.len())
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Remove one key from both tiers and from every group
    pub async fn invalidate(&self, namespace: &str, id: &str) -> CacheResult<()> {
        self.inner.policies.resolve(namespace)?;
        let key = CacheKey::new(namespace, id);

        self.inner.local.remove(key.as_str());
        if let Err(e) = self.inner.remote.delete(key.as_str()).await {
            self.inner.record_remote_error("delete", key.as_str(), &e);
        }
        self.inner.groups.forget_key(key.as_str());
        self.inner.stats.record_invalidations(1);

        debug!(key = %key, "Cache key invalidated");
        Ok(())
    }

    /// Remove every key matching a Redis-style glob from both tiers
    ///
    /// The returned and recorded count is the remote tier's count when the
    /// remote delete ran and succeeded. Otherwise it is the number of local
    /// entries removed, which is only a lower bound on what was invalidated.
    /// Callers that need to know which applies should check `source`.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> CacheResult<PatternInvalidation> {
        let glob = GlobPattern::new(pattern)?;

        let local_removed = self.inner.local.remove_matching(|k| glob.matches(k)) as u64;
        self.inner.groups.forget_matching(|k| glob.matches(k));

        let (count, source) = match self.inner.remote.delete_pattern(pattern).await {
            Ok(Some(remote_count)) => (remote_count, CountSource::Remote),
            Ok(None) => (local_removed, CountSource::LocalEstimate),
            Err(e) => {
                self.inner.record_remote_error("delete_pattern", pattern, &e);
                (local_removed, CountSource::LocalEstimate)
            }
        };
        self.inner.stats.record_invalidations(count);

        log_cache_operation!(
            info,
            "invalidate_by_pattern",
            pattern: pattern,
            count: count,
            source: source,
            local_removed: local_removed
        );
        Ok(PatternInvalidation {
            count,
            source,
            local_removed,
        })
    }

    /// Invalidate every key of one namespace
    pub async fn invalidate_namespace(&self, namespace: &str) -> CacheResult<PatternInvalidation> {
        self.inner.policies.resolve(namespace)?;
        let pattern = format!("{}{}*", glob::escape(namespace), crate::constants::KEY_SEPARATOR);
        self.invalidate_by_pattern(&pattern).await
    }

    /// Enrol an existing key in a group
    ///
    /// Returns `false` if it was already a member.
    pub fn add_to_group(&self, group: &str, namespace: &str, id: &str) -> CacheResult<bool> {
        let policy = self.inner.policies.resolve(namespace)?;
        let key = CacheKey::new(namespace, id);
        // last write time is unknown; bound by the longest TTL a write could carry
        let longest_ttl = policy.remote_ttl.max(self.inner.config.warming.remote_ttl());
        Ok(self
            .inner
            .groups
            .add_to_group(group, key.as_str(), Instant::now() + longest_ttl))
    }

    /// Current members of a group, sorted
    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.inner.groups.members(group)
    }

    /// Invalidate every member of a group in both tiers and clear the group
    ///
    /// Returns the number of member keys invalidated. Remote deletes run
    /// concurrently, each through the circuit breaker.
    pub async fn invalidate_group(&self, group: &str) -> usize {
        let keys = self.inner.groups.take_group(group);
        if keys.is_empty() {
            return 0;
        }

        for key in &keys {
            self.inner.local.remove(key);
        }
        let results = join_all(keys.iter().map(|key| self.inner.remote.delete(key))).await;
        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                self.inner.record_remote_error("delete", key, &e);
            }
        }
        self.inner.stats.record_invalidations(keys.len() as u64);

        log_cache_operation!(info, "invalidate_group", group: group, count: keys.len());
        keys.len()
    }

    /// Drop every local entry and all group memberships
    ///
    /// The remote tier is untouched. Returns the number of local entries
    /// dropped.
    pub fn clear_local(&self) -> usize {
        let cleared = self.inner.local.clear();
        self.inner.groups.clear();
        info!(engine_id = %self.inner.engine_id, cleared = cleared, "Local cache cleared");
        cleared
    }

    // =========================================================================
    // Observability
    // =========================================================================

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn clear_statistics(&self) {
        self.inner.stats.clear();
        info!(engine_id = %self.inner.engine_id, "Cache statistics cleared");
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.inner.remote.circuit_state()
    }

    pub fn circuit_metrics(&self) -> CircuitBreakerMetrics {
        self.inner.remote.breaker().metrics()
    }

    pub fn local_len(&self) -> usize {
        self.inner.local.len()
    }

    /// Whether a live local entry exists, without touching recency
    pub fn is_cached_locally(&self, namespace: &str, id: &str) -> bool {
        self.inner
            .local
            .contains(CacheKey::new(namespace, id).as_str())
    }

    /// Engine health
    ///
    /// Healthy when the circuit is closed, the hit rate exceeds the configured
    /// minimum (or nothing has been recorded yet), and the local tier is below
    /// capacity.
    pub fn health(&self) -> CacheHealthStatus {
        self.inner.health()
    }

    /// Probe the remote tier through the circuit breaker
    ///
    /// `false` when the probe fails, reports unhealthy, or is skipped because
    /// the circuit is open.
    pub async fn check_remote_health(&self) -> bool {
        match self.inner.remote.health_check().await {
            Ok(Some(healthy)) => healthy,
            Ok(None) => false,
            Err(e) => {
                self.inner.record_remote_error("health_check", "", &e);
                false
            }
        }
    }

    /// Run one maintenance tick with the configured sweep budget
    pub fn run_maintenance(&self) -> MaintenanceReport {
        self.run_maintenance_with(self.inner.config.maintenance.sweep_budget)
    }

    /// Run one maintenance tick
    ///
    /// Sweeps at most `sweep_budget` local entries, drops group memberships
    /// of keys that are gone from both tiers, re-evaluates the circuit
    /// cooldown, captures statistics and health, and refreshes the exported
    /// gauges.
    pub fn run_maintenance_with(&self, sweep_budget: usize) -> MaintenanceReport {
        let inner = &self.inner;

        let sweep = inner.local.sweep_expired(sweep_budget);
        inner.stats.record_expirations(sweep.expired as u64);
        inner.prune_groups();

        inner.remote.breaker().evaluate_cooldown();

        let statistics = inner.stats.snapshot();
        let health = inner.health();
        metrics::record_maintenance_tick(
            health.local_entries,
            health.local_capacity,
            statistics.hit_rate,
            health.circuit_state,
        );

        info!(
            engine_id = %inner.engine_id,
            local_entries = health.local_entries,
            hit_rate = statistics.hit_rate,
            total_operations = statistics.total_operations,
            swept = sweep.inspected,
            expired = sweep.expired,
            circuit_state = %health.circuit_state,
            healthy = health.healthy,
            "Cache maintenance tick"
        );

        MaintenanceReport {
            sweep,
            statistics,
            health,
            completed_at: chrono::Utc::now(),
        }
    }
}

impl EngineInner {
    /// Local write with capacity evictions counted
    fn populate_local(&self, key: &str, value: CacheValue, ttl: Duration) -> CacheResult<()> {
        let outcome = self.local.put(key, value, ttl)?;
        if outcome.evicted.is_some() {
            self.stats.record_eviction();
        }
        Ok(())
    }

    /// Release group members whose remote copy has expired
    fn prune_groups(&self) {
        let released = self.groups.prune_expired(Instant::now());
        if released > 0 {
            debug!(engine_id = %self.engine_id, released = released, "Released expired group members");
        }
    }

    fn record_remote_error(&self, operation: &'static str, target: &str, error: &CacheError) {
        self.stats.record_error();
        warn!(
            engine_id = %self.engine_id,
            operation = operation,
            target = target,
            error = %error,
            circuit_state = %self.remote.circuit_state(),
            "Remote cache operation failed"
        );
    }

    fn health(&self) -> CacheHealthStatus {
        let snapshot = self.stats.snapshot();
        let local_entries = self.local.len();
        let local_capacity = self.local.capacity();
        let circuit_state = self.remote.circuit_state();

        let healthy = circuit_state == CircuitState::Closed
            && (snapshot.total_operations == 0
                || snapshot.hit_rate > self.config.health.min_hit_rate)
            && local_entries < local_capacity;

        CacheHealthStatus {
            engine_id: self.engine_id,
            remote_provider: self.remote.provider_name().to_string(),
            local_entries,
            local_capacity,
            circuit_state,
            hit_rate: snapshot.hit_rate,
            total_operations: snapshot.total_operations,
            healthy,
        }
    }
}
