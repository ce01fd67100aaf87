//! Object cache benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keybox_bench::keyed_customers;
use keybox_testkit::order_harness;

/// Benchmark canonicalizing fresh instances.
fn bench_cache_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_add");

    for count in [100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("fresh", count), &count, |b, &count| {
            let harness = order_harness();
            let customers = keyed_customers(&harness, count);
            b.iter(|| {
                harness.cache.clear();
                for customer in &customers {
                    let ring = harness.ring(customer);
                    black_box(harness.cache.add("Customer", &ring, customer.clone()).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark lookups and merges against a populated cache.
fn bench_cache_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_hit");
    let harness = order_harness();
    let customers = keyed_customers(&harness, 1_000);
    for customer in &customers {
        harness
            .cache
            .add("Customer", &harness.ring(customer), customer.clone())
            .unwrap();
    }

    group.bench_function("try_get", |b| {
        let ring = harness.ring(&customers[500]);
        b.iter(|| black_box(harness.cache.try_get("Customer", &ring).unwrap()));
    });

    group.bench_function("try_get_interface", |b| {
        let ring = harness.ring(&customers[500]);
        b.iter(|| black_box(harness.cache.try_get("IParty", &ring).unwrap()));
    });

    group.bench_function("merge_duplicate", |b| {
        let code = harness.ring(&customers[0]).get("Code").unwrap();
        b.iter(|| {
            let duplicate = harness.create_with("Customer", &[("Code", code.clone())]);
            let ring = harness.ring(&duplicate);
            black_box(harness.cache.add("Customer", &ring, duplicate).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cache_add, bench_cache_hit);
criterion_main!(benches);
