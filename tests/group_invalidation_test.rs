//! Group and pattern invalidation across both tiers

mod common;

use common::{memory_engine, scripted_engine};
use tiercache_core::engine::CountSource;
use tiercache_core::error::CacheError;
use tiercache_core::remote::RemoteCacheService;

#[tokio::test]
async fn test_group_invalidation_spans_namespaces() {
    let (engine, remote) = scripted_engine();
    let group = "customer:42";

    engine.put("profile", "42", b"p".to_vec(), Some(group)).await.unwrap();
    engine.put("loan", "L-1", b"l1".to_vec(), Some(group)).await.unwrap();
    engine.put("loan", "L-2", b"l2".to_vec(), Some(group)).await.unwrap();
    engine.put("loan", "L-3", b"other".to_vec(), None).await.unwrap();

    assert_eq!(
        engine.group_members(group),
        vec!["loan:L-1", "loan:L-2", "profile:42"]
    );

    let count = engine.invalidate_group(group).await;

    assert_eq!(count, 3);
    assert!(engine.group_members(group).is_empty());
    assert!(!engine.is_cached_locally("profile", "42"));
    assert!(!engine.is_cached_locally("loan", "L-1"));
    assert!(engine.is_cached_locally("loan", "L-3"));
    assert_eq!(remote.store().get("loan:L-1").await.unwrap(), None);
    assert_eq!(remote.store().len(), 1);
    assert_eq!(engine.statistics().invalidations, 3);
}

#[tokio::test]
async fn test_unknown_group_is_a_noop() {
    let engine = memory_engine();
    assert_eq!(engine.invalidate_group("nobody").await, 0);
    assert_eq!(engine.statistics().invalidations, 0);
}

#[tokio::test]
async fn test_key_can_belong_to_several_groups() {
    let engine = memory_engine();
    engine.put("loan", "L-1", b"v".to_vec(), Some("customer:1")).await.unwrap();
    assert!(engine.add_to_group("branch:9", "loan", "L-1").unwrap());
    assert!(!engine.add_to_group("branch:9", "loan", "L-1").unwrap());

    assert_eq!(engine.invalidate_group("branch:9").await, 1);
    // membership in the other group is released too
    assert_eq!(engine.invalidate_group("customer:1").await, 0);
}

#[tokio::test]
async fn test_single_invalidation_releases_membership() {
    let engine = memory_engine();
    engine.put("loan", "a", b"1".to_vec(), Some("g")).await.unwrap();
    engine.put("loan", "b", b"2".to_vec(), Some("g")).await.unwrap();

    engine.invalidate("loan", "a").await.unwrap();

    assert_eq!(engine.group_members("g"), vec!["loan:b"]);
    assert_eq!(engine.invalidate_group("g").await, 1);
}

#[tokio::test]
async fn test_lru_eviction_keeps_group_membership() {
    let engine = memory_engine();
    // profile holds three entries locally
    engine.put("profile", "a", b"1".to_vec(), Some("g")).await.unwrap();
    for id in ["b", "c", "d"] {
        engine.put("profile", id, b"x".to_vec(), None).await.unwrap();
    }

    assert!(!engine.is_cached_locally("profile", "a"));
    assert_eq!(engine.group_members("g"), vec!["profile:a"]);

    // still present remotely until the group is invalidated
    assert!(engine.get("profile", "a").await.unwrap().is_some());
    assert_eq!(engine.invalidate_group("g").await, 1);
    assert!(engine.get("profile", "a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pattern_invalidation_reports_remote_count() {
    let engine = memory_engine();
    engine.put("loan", "c1:a", b"1".to_vec(), Some("g")).await.unwrap();
    engine.put("loan", "c1:b", b"2".to_vec(), None).await.unwrap();
    engine.put("loan", "c2:a", b"3".to_vec(), Some("g")).await.unwrap();

    // evict c1:b from L1 only, the remote still counts it
    engine.clear_local();
    engine.get("loan", "c1:a").await.unwrap();
    engine.add_to_group("g", "loan", "c1:a").unwrap();
    engine.add_to_group("g", "loan", "c2:a").unwrap();

    let outcome = engine.invalidate_by_pattern("loan:c1:*").await.unwrap();

    assert_eq!(outcome.source, CountSource::Remote);
    assert_eq!(outcome.count, 2);
    assert_eq!(outcome.local_removed, 1);
    assert_eq!(engine.group_members("g"), vec!["loan:c2:a"]);
    assert_eq!(engine.statistics().invalidations, 2);
}

#[tokio::test]
async fn test_namespace_invalidation() {
    let engine = memory_engine();
    engine.put("loan", "1", b"1".to_vec(), None).await.unwrap();
    engine.put("loan", "2", b"2".to_vec(), None).await.unwrap();
    engine.put("profile", "1", b"p".to_vec(), None).await.unwrap();

    let outcome = engine.invalidate_namespace("loan").await.unwrap();

    assert_eq!(outcome.count, 2);
    assert!(engine.get("loan", "1").await.unwrap().is_none());
    assert!(engine.is_cached_locally("profile", "1"));
}

#[tokio::test]
async fn test_malformed_pattern_is_rejected() {
    let engine = memory_engine();
    engine.put("loan", "1", b"1".to_vec(), None).await.unwrap();

    let result = engine.invalidate_by_pattern("loan:[").await;

    assert!(matches!(result, Err(CacheError::InvalidPattern { .. })));
    assert!(engine.is_cached_locally("loan", "1"));
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_releases_members_expired_from_both_tiers() {
    let engine = memory_engine();
    // token keeps entries 5s remotely, loan 1200s
    engine.put("token", "t-1", b"t".to_vec(), Some("customer:5")).await.unwrap();
    engine.put("loan", "L-5", b"l".to_vec(), Some("customer:5")).await.unwrap();

    tokio::time::advance(std::time::Duration::from_secs(6)).await;
    engine.run_maintenance();

    assert_eq!(engine.group_members("customer:5"), vec!["loan:L-5"]);
    assert_eq!(engine.invalidate_group("customer:5").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rewrite_keeps_group_member_alive() {
    let engine = memory_engine();
    engine.put("token", "t-1", b"v1".to_vec(), Some("customer:6")).await.unwrap();

    tokio::time::advance(std::time::Duration::from_secs(4)).await;
    // a plain write refreshes the remote expiry of the member
    engine.put("token", "t-1", b"v2".to_vec(), None).await.unwrap();
    tokio::time::advance(std::time::Duration::from_secs(4)).await;
    engine.run_maintenance();

    assert_eq!(engine.group_members("customer:6"), vec!["token:t-1"]);
}
