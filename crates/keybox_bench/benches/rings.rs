//! Key ring lookup and access benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keybox_bench::keyed_customers;
use keybox_codec::Value;
use keybox_testkit::{order_harness, scenarios};

/// Benchmark attaching and re-reading rings.
fn bench_ring_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_lookup");

    for count in [100, 1_000, 10_000] {
        let harness = order_harness();
        let customers = keyed_customers(&harness, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("attached", count), &customers, |b, customers| {
            b.iter(|| {
                for customer in customers {
                    black_box(harness.ring(customer));
                }
            });
        });
    }

    group.bench_function("first_access", |b| {
        let harness = order_harness();
        b.iter(|| {
            let customer = harness.create("Customer");
            black_box(harness.ring(&customer));
        });
    });

    group.finish();
}

/// Benchmark reading and writing parts of different kinds.
fn bench_part_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("part_access");
    let harness = order_harness();
    let (_customer, order) = scenarios::customer_order(&harness, "ACME", 7);
    let line = harness.create_with("OrderLine", &[("Line", Value::Integer(1))]);
    harness.link(&line, "Order", &order);

    let order_ring = harness.ring(&order);
    let line_ring = harness.ring(&line);

    group.bench_function("path_read", |b| {
        b.iter(|| black_box(order_ring.get("Number").unwrap()));
    });

    group.bench_function("foreign_key_read", |b| {
        b.iter(|| black_box(line_ring.get("Client").unwrap()));
    });

    group.bench_function("key_values", |b| {
        b.iter(|| black_box(line_ring.key_values().unwrap()));
    });

    group.bench_function("path_write", |b| {
        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            order_ring.set("Number", black_box(n)).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ring_lookup, bench_part_access);
criterion_main!(benches);
