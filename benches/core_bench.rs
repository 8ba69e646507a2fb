//! Benchmarks for jig core operations.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jig::core::types::Invocation;
use jig::core::{parser, planner, resolver};
use jig::journal::hasher;

/// A chain `node-0000: node-0001`, ..., each recipe with two lines.
fn chain_source(n: usize) -> String {
    let mut src = String::new();
    for i in 0..n {
        if i + 1 < n {
            src.push_str(&format!("node-{i:04}: node-{:04}\n", i + 1));
        } else {
            src.push_str(&format!("node-{i:04}:\n"));
        }
        src.push_str(&format!("    echo start {i}\n    echo done {i}\n\n"));
    }
    src
}

/// Every recipe depends on every later one: worst case for deduplication.
fn dense_source(n: usize) -> String {
    let mut src = String::new();
    for i in 0..n {
        let prereqs: Vec<String> = ((i + 1)..n).map(|j| format!("r{j}")).collect();
        src.push_str(&format!("r{i}: {}\n    echo {i}\n", prereqs.join(" ")));
    }
    src
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for n in [10, 100, 1000] {
        let src = chain_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let store = parser::parse(black_box(src)).unwrap();
                black_box(store);
            });
        });
    }
    group.finish();
}

fn bench_resolve_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_chain");
    for n in [10, 50, 100] {
        let store = parser::parse(&chain_source(n)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &store, |b, store| {
            b.iter(|| {
                let order = resolver::resolve(store, black_box("node-0000")).unwrap();
                black_box(order);
            });
        });
    }
    group.finish();
}

fn bench_resolve_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_dense");
    for n in [10, 50, 100] {
        let store = parser::parse(&dense_source(n)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &store, |b, store| {
            b.iter(|| {
                let order = resolver::resolve(store, black_box("r0")).unwrap();
                black_box(order);
            });
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let store = parser::parse(&chain_source(100)).unwrap();
    let invocation = Invocation::new("node-0000", vec![]);
    c.bench_function("plan_chain_100", |b| {
        b.iter(|| {
            let plan = planner::plan(&store, black_box(&invocation)).unwrap();
            black_box(plan.line_count());
        });
    });
}

fn bench_hash_source(c: &mut Criterion) {
    let src = chain_source(1000);
    c.bench_function("hash_source_1000", |b| {
        b.iter(|| black_box(hasher::hash_source(black_box(&src))));
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_resolve_chain,
    bench_resolve_dense,
    bench_plan,
    bench_hash_source
);
criterion_main!(benches);
