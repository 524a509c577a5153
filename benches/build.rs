//! Performance benchmarks for the forward and inverse passes.
//!
//! Run with: `cargo bench --bench build`
//!
//! ## Workloads
//!
//! | Benchmark | Shape | Notes |
//! |-----------|-------|-------|
//! | build_records | list of n objects | one object per element, two fields each |
//! | build_shared | list of n aliases | one shared child, identity short-circuit |
//! | reify_records | JSON from build_records | full validation + reconstruction |

use criterion::{
    black_box, criterion_group, criterion_main,
    BenchmarkId, Criterion, Throughput,
};
use std::sync::Arc;

use relationalizer_kernel::{DataInstanceBuilder, HandlerRegistry, Object, Value};

/// Create a list of `n` distinct small objects.
fn make_records(n: usize) -> Value {
    Value::list((0..n).map(|i| {
        Value::object(
            Object::new("Row")
                .with_attr("id", i as i64)
                .with_attr("name", format!("row-{}", i % 16)),
        )
    }))
}

/// Create a list of `n` references to one object.
fn make_shared(n: usize) -> Value {
    let child = Value::object(Object::new("Row").with_attr("id", 0));
    Value::list((0..n).map(|_| child.clone()))
}

fn make_builder() -> DataInstanceBuilder {
    DataInstanceBuilder::with_registry(Arc::new(HandlerRegistry::with_builtins()))
}

/// Benchmark building distinct records.
fn bench_build_records(c: &mut Criterion) {
    let builder = make_builder();
    let mut group = c.benchmark_group("build_records");

    for n in [10, 100, 1000] {
        let value = make_records(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("rows", n), &value, |b, value| {
            b.iter(|| builder.build(black_box(value)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark building heavily aliased input.
fn bench_build_shared(c: &mut Criterion) {
    let builder = make_builder();
    let mut group = c.benchmark_group("build_shared");

    for n in [10, 100, 1000] {
        let value = make_shared(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("aliases", n), &value, |b, value| {
            b.iter(|| builder.build(black_box(value)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark reconstruction from JSON.
fn bench_reify_records(c: &mut Criterion) {
    let builder = make_builder();
    let mut group = c.benchmark_group("reify_records");

    for n in [10, 100, 1000] {
        let json = builder.build(&make_records(n)).unwrap().to_json().unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("rows", n), &json, |b, json| {
            b.iter(|| builder.reify(black_box(json)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build_records,
    bench_build_shared,
    bench_reify_records,
);
criterion_main!(benches);
