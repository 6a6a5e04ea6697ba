//! Engine hot-path benchmarks
//!
//! Run with `cargo bench --features benchmarks`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tiercache_core::config::{CacheEngineConfig, NamespacePolicyConfig};
use tiercache_core::remote::{GlobPattern, RemoteCacheProvider};
use tiercache_core::CacheEngine;
use tokio::runtime::Runtime;

fn engine(capacity: usize) -> CacheEngine {
    let config = CacheEngineConfig::for_test()
        .with_namespaces(vec![NamespacePolicyConfig::new("loan", capacity, 600, 1200)]);
    CacheEngine::new(config, RemoteCacheProvider::memory()).expect("valid benchmark config")
}

fn benchmark_l1_hit(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let engine = engine(10_000);
    rt.block_on(engine.put("loan", "hot", vec![0u8; 256], None))
        .expect("seed entry");

    c.bench_function("l1_hit", |b| {
        b.iter(|| rt.block_on(engine.get(black_box("loan"), black_box("hot"))))
    });
}

fn benchmark_put_with_eviction(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("put_with_eviction");

    for capacity in [100usize, 1_000, 10_000] {
        let engine = engine(capacity);
        let mut n: u64 = 0;
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| {
                n += 1;
                rt.block_on(engine.put("loan", &n.to_string(), vec![1u8; 64], None))
            })
        });
    }
    group.finish();
}

fn benchmark_glob_matching(c: &mut Criterion) {
    let pattern = GlobPattern::new("loan:customer-4?:*").expect("valid pattern");
    c.bench_function("glob_match", |b| {
        b.iter(|| pattern.matches(black_box("loan:customer-42:schedule")))
    });
}

criterion_group!(
    benches,
    benchmark_l1_hit,
    benchmark_put_with_eviction,
    benchmark_glob_matching
);
criterion_main!(benches);
