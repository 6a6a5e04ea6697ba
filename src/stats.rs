//! # Statistics Collector
//!
//! Hit/miss accounting for the engine. Counters are atomics; a read/write
//! gate makes `clear` and `snapshot` atomic with respect to increments, so a
//! snapshot never observes a half-reset counter block.
//!
//! Every increment is mirrored to the exported [`crate::metrics`] counters,
//! which are monotonic and unaffected by `clear`.

use crate::metrics::{self, EvictionReason, Tier};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Counters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Engine-wide cache counters
#[derive(Debug, Default)]
pub struct CacheStatistics {
    counters: Counters,
    /// Shared for increments, exclusive for `clear` and `snapshot`
    gate: RwLock<()>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub total_hits: u64,
    pub total_operations: u64,
    pub hit_rate: f64,
    pub l1_hit_rate: f64,
    pub captured_at: DateTime<Utc>,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn add(&self, counter: &AtomicU64, n: u64) {
        if n == 0 {
            return;
        }
        let _shared = self.gate.read();
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_l1_hit(&self) {
        self.add(&self.counters.l1_hits, 1);
        metrics::record_hit(Tier::L1);
    }

    pub fn record_l2_hit(&self) {
        self.add(&self.counters.l2_hits, 1);
        metrics::record_hit(Tier::L2);
    }

    pub fn record_miss(&self) {
        self.add(&self.counters.misses, 1);
        metrics::record_miss();
    }

    pub fn record_write(&self) {
        self.record_writes(1);
    }

    pub fn record_writes(&self, count: u64) {
        self.add(&self.counters.writes, count);
        metrics::record_writes(count);
    }

    pub fn record_error(&self) {
        self.add(&self.counters.errors, 1);
        metrics::record_error();
    }

    pub fn record_eviction(&self) {
        self.add(&self.counters.evictions, 1);
        metrics::record_evictions(EvictionReason::Capacity, 1);
    }

    /// Expired entries removed by a sweep count as evictions
    pub fn record_expirations(&self, count: u64) {
        self.add(&self.counters.evictions, count);
        if count > 0 {
            metrics::record_evictions(EvictionReason::Expired, count);
        }
    }

    pub fn record_invalidations(&self, count: u64) {
        self.add(&self.counters.invalidations, count);
        if count > 0 {
            metrics::record_invalidations(count);
        }
    }

    /// Reset every counter to zero
    pub fn clear(&self) {
        let _exclusive = self.gate.write();
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let _exclusive = self.gate.write();
        let c = &self.counters;
        let l1_hits = c.l1_hits.load(Ordering::Relaxed);
        let l2_hits = c.l2_hits.load(Ordering::Relaxed);
        let misses = c.misses.load(Ordering::Relaxed);
        let total_hits = l1_hits + l2_hits;
        let total_operations = total_hits + misses;

        let ratio = |n: u64| {
            if total_operations > 0 {
                n as f64 / total_operations as f64
            } else {
                0.0
            }
        };

        StatisticsSnapshot {
            l1_hits,
            l2_hits,
            misses,
            writes: c.writes.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            total_hits,
            total_operations,
            hit_rate: ratio(total_hits),
            l1_hit_rate: ratio(l1_hits),
            captured_at: Utc::now(),
        }
    }

    fn all(&self) -> [&AtomicU64; 7] {
        let c = &self.counters;
        [
            &c.l1_hits,
            &c.l2_hits,
            &c.misses,
            &c.writes,
            &c.errors,
            &c.evictions,
            &c.invalidations,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_hit_rate_is_zero_without_operations() {
        let stats = CacheStatistics::new();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_operations, 0);
        assert_eq!(snapshot.hit_rate, 0.0);
    }

    #[test]
    fn test_derived_values() {
        let stats = CacheStatistics::new();
        stats.record_l1_hit();
        stats.record_l1_hit();
        stats.record_l2_hit();
        stats.record_miss();
        stats.record_writes(3);
        stats.record_expirations(2);
        stats.record_eviction();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_hits, 3);
        assert_eq!(snapshot.total_operations, 4);
        assert!((snapshot.hit_rate - 0.75).abs() < f64::EPSILON);
        assert!((snapshot.l1_hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.writes, 3);
        assert_eq!(snapshot.evictions, 3);
    }

    #[test]
    fn test_clear_resets_everything() {
        let stats = CacheStatistics::new();
        stats.record_miss();
        stats.record_error();
        stats.record_invalidations(4);
        stats.clear();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.invalidations, 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(CacheStatistics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_l1_hit();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().l1_hits, 8000);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = CacheStatistics::new();
        stats.record_l2_hit();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["l2_hits"], 1);
        assert!(json["captured_at"].is_string());
    }
}
