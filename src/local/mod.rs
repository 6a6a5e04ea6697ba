//! # Local (L1) Store
//!
//! Process-local LRU cache partitioned by namespace. Each namespace has its
//! own capacity and its own lock, so a hot namespace never evicts entries of
//! another and readers of different namespaces never contend.
//!
//! Expired entries are dropped lazily when read and in bounded batches by
//! [`LocalStore::sweep_expired`]. The store performs no I/O.

pub mod entry;

pub use entry::{CacheEntry, CacheValue};

use crate::error::{CacheError, CacheResult};
use crate::key::namespace_of;
use crate::policy::PolicyTable;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Result of a `put`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    /// Key pushed out to make room, if the namespace was at capacity
    pub evicted: Option<String>,
    /// Whether an existing entry for the same key was replaced
    pub replaced: bool,
}

/// Result of one bounded expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub inspected: usize,
    pub expired: usize,
    /// The sweep reached the end of the last partition and wrapped around
    pub completed_pass: bool,
}

#[derive(Debug, Default)]
struct SweepCursor {
    partition: usize,
    offset: usize,
}

struct Partition {
    capacity: NonZeroUsize,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

/// Namespace-partitioned LRU store
pub struct LocalStore {
    partitions: HashMap<String, Partition>,
    /// Partition names in sweep order
    sweep_order: Vec<String>,
    cursor: Mutex<SweepCursor>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("namespaces", &self.sweep_order)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl LocalStore {
    /// One partition per configured namespace
    pub fn new(policies: &PolicyTable) -> Self {
        let mut partitions = HashMap::with_capacity(policies.len());
        let mut sweep_order = Vec::with_capacity(policies.len());

        for policy in policies.namespaces() {
            sweep_order.push(policy.namespace.clone());
            partitions.insert(
                policy.namespace.clone(),
                Partition {
                    capacity: policy.max_local_entries,
                    entries: Mutex::new(LruCache::new(policy.max_local_entries)),
                },
            );
        }

        Self {
            partitions,
            sweep_order,
            cursor: Mutex::new(SweepCursor::default()),
        }
    }

    fn partition_for(&self, key: &str) -> CacheResult<&Partition> {
        let namespace = namespace_of(key).unwrap_or(key);
        self.partitions
            .get(namespace)
            .ok_or_else(|| CacheError::UnknownNamespace(namespace.to_string()))
    }

    /// Live value for `key`, refreshing its recency
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let partition = self.partition_for(key).ok()?;
        let now = Instant::now();
        let mut entries = partition.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        entries.pop(key);
        None
    }

    /// Whether a live entry exists, without touching recency
    pub fn contains(&self, key: &str) -> bool {
        let Ok(partition) = self.partition_for(key) else {
            return false;
        };
        let now = Instant::now();
        partition
            .entries
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Insert or replace `key`, expiring after `ttl`
    pub fn put(&self, key: &str, value: CacheValue, ttl: Duration) -> CacheResult<PutOutcome> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl {
                key: key.to_string(),
                reason: "TTL must be greater than zero".to_string(),
            });
        }
        let partition = self.partition_for(key)?;
        let entry = CacheEntry::new(value, Instant::now(), ttl);

        let displaced = partition.entries.lock().push(key.to_string(), entry);
        let outcome = match displaced {
            Some((old_key, _)) if old_key == key => PutOutcome {
                evicted: None,
                replaced: true,
            },
            Some((old_key, _)) => {
                debug!(key = key, evicted = %old_key, "L1 capacity eviction");
                PutOutcome {
                    evicted: Some(old_key),
                    replaced: false,
                }
            }
            None => PutOutcome::default(),
        };
        Ok(outcome)
    }

    /// Remove `key`; `true` if an entry was present
    pub fn remove(&self, key: &str) -> bool {
        self.partition_for(key)
            .map(|p| p.entries.lock().pop(key).is_some())
            .unwrap_or(false)
    }

    /// Remove every key accepted by `predicate`, returning how many went
    pub fn remove_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = 0;
        for partition in self.partitions.values() {
            let mut entries = partition.entries.lock();
            let matching: Vec<String> = entries
                .iter()
                .filter(|(k, _)| predicate(k))
                .map(|(k, _)| k.clone())
                .collect();
            for key in matching {
                if entries.pop(&key).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Drop every entry, returning how many were held
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        for partition in self.partitions.values() {
            let mut entries = partition.entries.lock();
            cleared += entries.len();
            entries.clear();
        }
        *self.cursor.lock() = SweepCursor::default();
        cleared
    }

    /// Entries held across all namespaces, including not-yet-swept expired ones
    pub fn len(&self) -> usize {
        self.partitions
            .values()
            .map(|p| p.entries.lock().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn namespace_len(&self, namespace: &str) -> usize {
        self.partitions
            .get(namespace)
            .map(|p| p.entries.lock().len())
            .unwrap_or(0)
    }

    /// Sum of every partition's capacity
    pub fn capacity(&self) -> usize {
        self.partitions.values().map(|p| p.capacity.get()).sum()
    }

    /// Inspect at most `budget` entries for expiry, resuming where the
    /// previous sweep stopped
    ///
    /// Within a partition entries are visited least-recently-used first.
    pub fn sweep_expired(&self, budget: usize) -> SweepReport {
        let mut report = SweepReport::default();
        if self.sweep_order.is_empty() || budget == 0 {
            return report;
        }

        let mut cursor = self.cursor.lock();
        let mut partitions_visited = 0;

        while report.inspected < budget && partitions_visited <= self.sweep_order.len() {
            let name = &self.sweep_order[cursor.partition];
            let Some(partition) = self.partitions.get(name) else {
                break;
            };

            let remaining = budget - report.inspected;
            let now = Instant::now();
            let mut entries = partition.entries.lock();

            let mut inspected = 0;
            let expired: Vec<String> = entries
                .iter()
                .rev()
                .skip(cursor.offset)
                .take(remaining)
                .inspect(|_| inspected += 1)
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                entries.pop(key);
            }
            let live_left = entries.len();
            drop(entries);

            report.inspected += inspected;
            report.expired += expired.len();
            cursor.offset += inspected - expired.len();

            if cursor.offset >= live_left {
                cursor.partition += 1;
                cursor.offset = 0;
                partitions_visited += 1;
                if cursor.partition == self.sweep_order.len() {
                    cursor.partition = 0;
                    report.completed_pass = true;
                    break;
                }
            }
        }

        report
    }
}
