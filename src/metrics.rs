//! # Cache Metrics
//!
//! OpenTelemetry instruments for the cache engine:
//! - Hit, miss, write, error, eviction and invalidation counters
//! - Remote call duration histogram
//! - L1 occupancy, hit rate and circuit breaker gauges, refreshed on every
//!   maintenance tick
//!
//! Instruments are built from the global meter provider. The host
//! application installs its provider (OTLP exporter, Prometheus bridge, ...)
//! and then calls [`init`]. Until then every recording helper is a no-op.
//!
//! ## Usage
//!
//! ```rust
//! use tiercache_core::metrics;
//!
//! // after opentelemetry::global::set_meter_provider(...)
//! metrics::init();
//!
//! metrics::record_hit(metrics::Tier::L1);
//! metrics::record_remote_call("GET", metrics::RemoteOutcome::Success, 1.7);
//! ```

use crate::resilience::CircuitState;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

/// Lazy-initialized meter for cache metrics
static CACHE_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    CACHE_METER.get_or_init(|| opentelemetry::global::meter("tiercache"))
}

/// Cache tier a hit was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    L1,
    L2,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::L1 => "l1",
            Tier::L2 => "l2",
        }
    }
}

/// Why an L1 entry left the store without being invalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Capacity,
    Expired,
}

impl EvictionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EvictionReason::Capacity => "capacity",
            EvictionReason::Expired => "expired",
        }
    }
}

/// Result of one guarded remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Success,
    Failure,
    Timeout,
}

impl RemoteOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteOutcome::Success => "success",
            RemoteOutcome::Failure => "failure",
            RemoteOutcome::Timeout => "timeout",
        }
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Lookups served from a cache tier
///
/// Labels:
/// - tier: l1, l2
pub fn hits_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.hits.total")
        .with_description("Lookups served from a cache tier")
        .build()
}

/// Lookups that missed both tiers
pub fn misses_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.misses.total")
        .with_description("Lookups that missed both cache tiers")
        .build()
}

/// Entries written through to the cache
pub fn writes_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.writes.total")
        .with_description("Entries written to the cache")
        .build()
}

/// Absorbed remote failures and undecodable payloads
pub fn errors_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.errors.total")
        .with_description("Cache operation errors absorbed by the engine")
        .build()
}

/// L1 entries removed by capacity pressure or expiry
///
/// Labels:
/// - reason: capacity, expired
pub fn evictions_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.evictions.total")
        .with_description("Local entries evicted by capacity or expiry")
        .build()
}

/// Keys invalidated explicitly
pub fn invalidations_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.invalidations.total")
        .with_description("Cache keys invalidated")
        .build()
}

/// Remote calls skipped while the circuit was open
///
/// Labels:
/// - operation: GET, SET, SET_BATCH, DEL, DEL_PATTERN, PING
pub fn remote_skipped_total() -> Counter<u64> {
    meter()
        .u64_counter("tiercache.remote.skipped.total")
        .with_description("Remote cache calls skipped by the open circuit")
        .build()
}

// ============================================================================
// Histograms
// ============================================================================

/// Remote call duration in milliseconds
///
/// Labels:
/// - operation: GET, SET, SET_BATCH, DEL, DEL_PATTERN, PING
/// - outcome: success, failure, timeout
pub fn remote_call_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("tiercache.remote.call.duration")
        .with_description("Remote cache call duration in milliseconds")
        .with_unit("ms")
        .build()
}

// ============================================================================
// Gauges
// ============================================================================

/// Live entries in the local tier
pub fn local_entries() -> Gauge<u64> {
    meter()
        .u64_gauge("tiercache.local.entries")
        .with_description("Entries currently held in the local tier")
        .build()
}

/// Configured capacity of the local tier
pub fn local_capacity() -> Gauge<u64> {
    meter()
        .u64_gauge("tiercache.local.capacity")
        .with_description("Total local tier capacity across namespaces")
        .build()
}

/// Overall hit rate since the last statistics reset (0.0 to 1.0)
pub fn hit_rate() -> Gauge<f64> {
    meter()
        .f64_gauge("tiercache.hit_rate")
        .with_description("Cache hit rate since the last statistics reset")
        .build()
}

/// Remote circuit breaker state (0 = closed, 1 = open)
pub fn circuit_breaker_state() -> Gauge<u64> {
    meter()
        .u64_gauge("tiercache.circuit_breaker.state")
        .with_description("Remote circuit breaker state (0=closed, 1=open)")
        .build()
}

// ============================================================================
// Static instances
// ============================================================================

pub static HITS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static MISSES_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static WRITES_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static ERRORS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static EVICTIONS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static INVALIDATIONS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static REMOTE_SKIPPED_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
pub static REMOTE_CALL_DURATION: OnceLock<Histogram<f64>> = OnceLock::new();
pub static LOCAL_ENTRIES: OnceLock<Gauge<u64>> = OnceLock::new();
pub static LOCAL_CAPACITY: OnceLock<Gauge<u64>> = OnceLock::new();
pub static HIT_RATE: OnceLock<Gauge<f64>> = OnceLock::new();
pub static CIRCUIT_BREAKER_STATE: OnceLock<Gauge<u64>> = OnceLock::new();

/// Initialize all cache metrics
///
/// Call once the global meter provider is installed. Instruments built
/// before that stay bound to the no-op provider.
pub fn init() {
    HITS_TOTAL.get_or_init(hits_total);
    MISSES_TOTAL.get_or_init(misses_total);
    WRITES_TOTAL.get_or_init(writes_total);
    ERRORS_TOTAL.get_or_init(errors_total);
    EVICTIONS_TOTAL.get_or_init(evictions_total);
    INVALIDATIONS_TOTAL.get_or_init(invalidations_total);
    REMOTE_SKIPPED_TOTAL.get_or_init(remote_skipped_total);
    REMOTE_CALL_DURATION.get_or_init(remote_call_duration);
    LOCAL_ENTRIES.get_or_init(local_entries);
    LOCAL_CAPACITY.get_or_init(local_capacity);
    HIT_RATE.get_or_init(hit_rate);
    CIRCUIT_BREAKER_STATE.get_or_init(circuit_breaker_state);

    tracing::debug!("Cache metrics initialized");
}

/// Whether [`init`] has run
pub fn is_initialized() -> bool {
    HITS_TOTAL.get().is_some()
}

// ============================================================================
// Recording helpers
// ============================================================================

pub fn record_hit(tier: Tier) {
    if let Some(counter) = HITS_TOTAL.get() {
        counter.add(1, &[KeyValue::new("tier", tier.as_str())]);
    }
}

pub fn record_miss() {
    if let Some(counter) = MISSES_TOTAL.get() {
        counter.add(1, &[]);
    }
}

pub fn record_writes(count: u64) {
    if let Some(counter) = WRITES_TOTAL.get() {
        counter.add(count, &[]);
    }
}

pub fn record_error() {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.add(1, &[]);
    }
}

pub fn record_evictions(reason: EvictionReason, count: u64) {
    if let Some(counter) = EVICTIONS_TOTAL.get() {
        counter.add(count, &[KeyValue::new("reason", reason.as_str())]);
    }
}

pub fn record_invalidations(count: u64) {
    if let Some(counter) = INVALIDATIONS_TOTAL.get() {
        counter.add(count, &[]);
    }
}

pub fn record_remote_skipped(operation: &'static str) {
    if let Some(counter) = REMOTE_SKIPPED_TOTAL.get() {
        counter.add(1, &[KeyValue::new("operation", operation)]);
    }
}

pub fn record_remote_call(operation: &'static str, outcome: RemoteOutcome, duration_ms: f64) {
    if let Some(histogram) = REMOTE_CALL_DURATION.get() {
        histogram.record(
            duration_ms,
            &[
                KeyValue::new("operation", operation),
                KeyValue::new("outcome", outcome.as_str()),
            ],
        );
    }
}

/// Refresh the state gauges at the end of a maintenance tick
pub fn record_maintenance_tick(
    entries: usize,
    capacity: usize,
    current_hit_rate: f64,
    circuit_state: CircuitState,
) {
    if let Some(gauge) = LOCAL_ENTRIES.get() {
        gauge.record(entries as u64, &[]);
    }
    if let Some(gauge) = LOCAL_CAPACITY.get() {
        gauge.record(capacity as u64, &[]);
    }
    if let Some(gauge) = HIT_RATE.get() {
        gauge.record(current_hit_rate, &[]);
    }
    if let Some(gauge) = CIRCUIT_BREAKER_STATE.get() {
        gauge.record(circuit_state as u64, &[]);
    }
}
