//! Criterion micro-benchmarks for container mutation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use omnivec_arena::{Container, TypeRegistry};
use omnivec_bench::{int_profile, int_registry};

/// Benchmark: append 10K ints to a fresh container, then destroy it.
fn bench_append_10k(c: &mut Criterion) {
    let (reg, int) = int_registry();
    c.bench_function("append_10k", |b| {
        b.iter(|| {
            let mut v = Container::new(&reg, int).unwrap();
            for i in 0..10_000i32 {
                v.append(&reg, i).unwrap();
            }
            black_box(v.len());
            v.destroy(&reg);
        });
    });
}

/// Benchmark: fill to 10K then pop everything, exercising shrink.
fn bench_append_pop_10k(c: &mut Criterion) {
    let (reg, int) = int_registry();
    c.bench_function("append_pop_10k", |b| {
        b.iter(|| {
            let mut v = int_profile(&reg, int, 10_000).unwrap();
            while !v.is_empty() {
                v.pop(&reg).unwrap();
            }
            black_box(v.capacity());
        });
    });
}

/// Benchmark: insert at the front of a growing container, 1K times.
fn bench_insert_front_1k(c: &mut Criterion) {
    let (reg, int) = int_registry();
    c.bench_function("insert_front_1k", |b| {
        b.iter(|| {
            let mut v = int_profile(&reg, int, 1).unwrap();
            for i in 0..1_000i32 {
                v.insert(&reg, 0, i).unwrap();
            }
            black_box(v.len());
            v.destroy(&reg);
        });
    });
}

/// Benchmark: slice a 10K container in halves and splice them back.
fn bench_slice_splice_10k(c: &mut Criterion) {
    let (reg, int) = int_registry();
    let src = int_profile(&reg, int, 10_000).unwrap();
    c.bench_function("slice_splice_10k", |b| {
        b.iter(|| {
            let mut head = src.slice(&reg, 0, 5_000).unwrap();
            let tail = src.slice(&reg, 5_000, 10_000).unwrap();
            head.splice_insert(&reg, &tail, 0).unwrap();
            black_box(head.len());
        });
    });
}

/// Benchmark: owned-element churn with `String`.
fn bench_string_churn_1k(c: &mut Criterion) {
    let reg = TypeRegistry::new();
    let string = reg.lookup(TypeRegistry::STRING).unwrap();
    c.bench_function("string_churn_1k", |b| {
        b.iter(|| {
            let mut v = Container::new(&reg, string).unwrap();
            for i in 0..1_000 {
                v.append(&reg, i.to_string()).unwrap();
            }
            v.remove_range(&reg, 100, 900).unwrap();
            black_box(v.len());
            v.destroy(&reg);
        });
    });
}

criterion_group!(
    benches,
    bench_append_10k,
    bench_append_pop_10k,
    bench_insert_front_1k,
    bench_slice_splice_10k,
    bench_string_churn_1k
);
criterion_main!(benches);
