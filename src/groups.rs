//! # Group Registry
//!
//! Advisory mapping of named groups to cache keys, used to invalidate related
//! entries together (for example every cached view of one customer).
//!
//! Membership outlives L1 eviction: a key evicted from the local tier may
//! still be live remotely. Each member carries the latest instant at which
//! its remote copy can still exist; once that passes the key is gone from
//! both tiers and [`GroupRegistry::prune_expired`] releases it.
//!
//! Both directions of the index live behind one lock, so an enrolment racing
//! a `take_group` lands either in the taken set or in a fresh group.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;

#[derive(Debug)]
struct Membership {
    groups: HashSet<String>,
    /// Latest remote expiry seen for the key
    live_until: Instant,
}

#[derive(Debug, Default)]
struct GroupIndex {
    members: HashMap<String, HashSet<String>>,
    memberships: HashMap<String, Membership>,
}

impl GroupIndex {
    fn forget_key(&mut self, key: &str) -> bool {
        let Some(membership) = self.memberships.remove(key) else {
            return false;
        };
        for group in membership.groups {
            if let Some(keys) = self.members.get_mut(&group) {
                keys.remove(key);
                if keys.is_empty() {
                    self.members.remove(&group);
                }
            }
        }
        true
    }
}

/// Bidirectional group ↔ key index
#[derive(Debug, Default)]
pub struct GroupRegistry {
    index: RwLock<GroupIndex>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrol `key` in `group`; returns `false` if it was already a member
    ///
    /// `live_until` extends the key's recorded remote expiry, it never
    /// shortens it.
    pub fn add_to_group(&self, group: &str, key: &str, live_until: Instant) -> bool {
        let mut index = self.index.write();
        let added = index
            .members
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string());

        let membership = index
            .memberships
            .entry(key.to_string())
            .or_insert_with(|| Membership {
                groups: HashSet::new(),
                live_until,
            });
        membership.groups.insert(group.to_string());
        membership.live_until = membership.live_until.max(live_until);
        added
    }

    /// Record a fresh remote write of `key`; no-op for keys in no group
    pub fn touch(&self, key: &str, live_until: Instant) {
        if !self.index.read().memberships.contains_key(key) {
            return;
        }
        if let Some(membership) = self.index.write().memberships.get_mut(key) {
            membership.live_until = membership.live_until.max(live_until);
        }
    }

    /// Detach and return every member of `group`
    ///
    /// The returned keys are also removed from any other group they belonged
    /// to, since the caller is about to invalidate them.
    pub fn take_group(&self, group: &str) -> Vec<String> {
        let mut index = self.index.write();
        let Some(keys) = index.members.remove(group) else {
            return Vec::new();
        };
        for key in &keys {
            index.forget_key(key);
        }
        let mut keys: Vec<String> = keys.into_iter().collect();
        keys.sort();
        keys
    }

    /// Drop `key` from every group it belongs to
    pub fn forget_key(&self, key: &str) {
        self.index.write().forget_key(key);
    }

    /// Drop every key accepted by `predicate`
    pub fn forget_matching<F>(&self, predicate: F)
    where
        F: Fn(&str) -> bool,
    {
        let mut index = self.index.write();
        let keys: Vec<String> = index
            .memberships
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        for key in keys {
            index.forget_key(&key);
        }
    }

    /// Release members whose remote copy has expired by `now`
    ///
    /// Returns the number of keys released.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .index
            .read()
            .memberships
            .iter()
            .filter(|(_, membership)| membership.live_until <= now)
            .map(|(key, _)| key.clone())
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let mut index = self.index.write();
        let mut released = 0;
        for key in expired {
            // a write may have extended it since the scan
            let still_expired = index
                .memberships
                .get(&key)
                .is_some_and(|membership| membership.live_until <= now);
            if still_expired && index.forget_key(&key) {
                released += 1;
            }
        }
        released
    }

    /// Current members of `group`, sorted
    pub fn members(&self, group: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .index
            .read()
            .members
            .get(group)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Groups `key` belongs to, sorted
    pub fn groups_of(&self, key: &str) -> Vec<String> {
        let mut groups: Vec<String> = self
            .index
            .read()
            .memberships
            .get(key)
            .map(|membership| membership.groups.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    pub fn group_count(&self) -> usize {
        self.index.read().members.len()
    }

    /// Keys enrolled in at least one group
    pub fn member_count(&self) -> usize {
        self.index.read().memberships.len()
    }

    pub fn clear(&self) {
        let mut index = self.index.write();
        index.members.clear();
        index.memberships.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = GroupRegistry::new();
        assert!(registry.add_to_group("customer:7", "profile:7", far()));
        assert!(!registry.add_to_group("customer:7", "profile:7", far()));
        assert_eq!(registry.members("customer:7"), vec!["profile:7"]);
        assert_eq!(registry.group_count(), 1);
    }

    #[test]
    fn test_take_group_clears_membership_everywhere() {
        let registry = GroupRegistry::new();
        registry.add_to_group("customer:7", "profile:7", far());
        registry.add_to_group("customer:7", "loan:70", far());
        registry.add_to_group("branch:1", "loan:70", far());

        let taken = registry.take_group("customer:7");
        assert_eq!(taken, vec!["loan:70", "profile:7"]);
        assert!(registry.members("customer:7").is_empty());
        assert!(registry.groups_of("loan:70").is_empty());
        // branch:1 lost its only member and is gone
        assert_eq!(registry.group_count(), 0);
        assert!(registry.take_group("customer:7").is_empty());
    }

    #[test]
    fn test_forget_key_keeps_other_members() {
        let registry = GroupRegistry::new();
        registry.add_to_group("g", "a:1", far());
        registry.add_to_group("g", "a:2", far());
        registry.forget_key("a:1");
        assert_eq!(registry.members("g"), vec!["a:2"]);
        assert!(registry.groups_of("a:1").is_empty());
    }

    #[test]
    fn test_forget_matching() {
        let registry = GroupRegistry::new();
        registry.add_to_group("g", "loan:1", far());
        registry.add_to_group("g", "payment:1", far());
        registry.forget_matching(|k| k.starts_with("loan:"));
        assert_eq!(registry.members("g"), vec!["payment:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_releases_only_expired_members() {
        let registry = GroupRegistry::new();
        let now = Instant::now();
        registry.add_to_group("customer:1", "token:1", now + Duration::from_secs(5));
        registry.add_to_group("customer:1", "loan:1", now + Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(registry.prune_expired(Instant::now()), 1);
        assert_eq!(registry.members("customer:1"), vec!["loan:1"]);
        assert_eq!(registry.member_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_extends_membership() {
        let registry = GroupRegistry::new();
        let now = Instant::now();
        registry.add_to_group("customer:1", "token:1", now + Duration::from_secs(5));
        registry.touch("token:1", now + Duration::from_secs(30));
        // untracked keys are not enrolled by a touch
        registry.touch("token:2", now + Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(registry.prune_expired(Instant::now()), 0);
        assert_eq!(registry.members("customer:1"), vec!["token:1"]);
        assert_eq!(registry.member_count(), 1);
    }

    #[test]
    fn test_concurrent_add_and_take_keep_index_consistent() {
        let registry = Arc::new(GroupRegistry::new());
        let deadline = far();

        let adders: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        registry.add_to_group("customer:1", &format!("loan:{}", (t * i) % 16), deadline);
                    }
                })
            })
            .collect();
        let taker = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    registry.take_group("customer:1");
                }
            })
        };
        for handle in adders {
            handle.join().unwrap();
        }
        taker.join().unwrap();

        // every key still indexed as a member is reachable from its group
        let members = registry.members("customer:1");
        for i in 0..16 {
            let key = format!("loan:{i}");
            let in_group = members.contains(&key);
            let has_membership = !registry.groups_of(&key).is_empty();
            assert_eq!(in_group, has_membership, "index diverged for {key}");
        }
        registry.take_group("customer:1");
        assert_eq!(registry.member_count(), 0);
    }
}
