use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use minicache_core::{CacheOptions, CallArgs, GlobalCache, MemberCache};
use std::thread;

fn bench_set_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_sequential");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("enabled", size), size, |b, &size| {
            b.iter(|| {
                let cache = GlobalCache::new(CacheOptions::default());
                for i in 0..size {
                    cache.set(format!("key{}", i), black_box(i));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("disabled", size), size, |b, &size| {
            b.iter(|| {
                let cache = GlobalCache::new(CacheOptions::default().with_enabled(false));
                for i in 0..size {
                    cache.set(format!("key{}", i), black_box(i));
                }
            });
        });
    }

    group.finish();
}

fn bench_get_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_sequential");

    for size in [10, 100, 1000].iter() {
        let cache = GlobalCache::new(CacheOptions::default());
        for i in 0..*size {
            cache.set(format!("key{}", i), i);
        }

        group.bench_with_input(BenchmarkId::new("hit", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(cache.get::<i32>(format!("key{}", i)));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("miss", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(cache.get::<i32>(format!("absent{}", i)));
                }
            });
        });
    }

    group.finish();
}

fn bench_memoized_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("memoized_call");

    let cache = GlobalCache::new(CacheOptions::default());
    let square = cache
        .this("square", |(x,): (u64,)| x * x)
        .expect("non-empty name");

    group.bench_function("global_this_hit", |b| {
        b.iter(|| black_box(square.call((black_box(12),))));
    });

    let members = MemberCache::new();
    let args = CallArgs::new().arg(&12u64).named("k", &4u64);
    group.bench_function("member_cache_hit", |b| {
        b.iter(|| black_box(members.get_or_insert_with("square", &args, || 144u64)));
    });

    group.finish();
}

fn bench_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    let cache = GlobalCache::new(CacheOptions::default());
    for i in 0..100 {
        cache.set(i, i * 2);
    }

    for threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("threads", threads),
            threads,
            |b, &threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let cache = cache.clone();
                            thread::spawn(move || {
                                for i in 0..100 {
                                    black_box(cache.get::<i32>(i));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_set_sequential,
    bench_get_sequential,
    bench_memoized_call,
    bench_concurrent_reads
);
criterion_main!(benches);
