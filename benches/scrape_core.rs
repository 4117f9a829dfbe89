//! 采集核心基准测试
//!
//! 测试目标身份哈希、抖动偏移计算与结果存储的吞吐性能

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use uptime_vitals::scrape::{MemoryStore, ResultStore, Target, TargetHealth};
use url::Url;

/// 目标身份与抖动偏移基准测试
fn target_identity_benchmark(c: &mut Criterion) {
    c.bench_function("target_creation_with_hash", |b| {
        let url = Url::parse("https://example.com/api/v1/health").unwrap();
        b.iter(|| {
            let target = Target::new(black_box(url.clone()));
            black_box(target.hash())
        });
    });

    c.bench_function("jitter_offset_computation", |b| {
        let target = Target::new(Url::parse("https://example.com/api/v1/health").unwrap());
        let interval = Duration::from_secs(30);
        b.iter(|| black_box(target.offset(black_box(interval), black_box(42))));
    });
}

/// 结果存储基准测试
fn result_store_benchmark(c: &mut Criterion) {
    c.bench_function("store_add_100", |b| {
        let store = MemoryStore::new(128);
        let url = Url::parse("https://example.com/").unwrap();
        b.iter(|| {
            tokio_test::block_on(async {
                for i in 0..100u64 {
                    store
                        .add(
                            url.clone(),
                            TargetHealth::Good,
                            Duration::from_millis(i),
                        )
                        .await
                        .unwrap();
                }
                black_box(store.commit().await)
            })
        });
    });

    c.bench_function("store_commit_empty", |b| {
        let store = MemoryStore::new(128);
        b.iter(|| tokio_test::block_on(async { black_box(store.commit().await) }));
    });
}

criterion_group!(benches, target_identity_benchmark, result_store_benchmark);
criterion_main!(benches);
