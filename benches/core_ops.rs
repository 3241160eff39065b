// Copyright 2026 The Ferrotree Authors. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Insert/get/range-scan throughput at a few orders (spec.md §2's
//! "implementation budget" components: node encoding, search/split).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrotree::Tree;
use tempfile::tempdir;

fn populated(order: u32, n: u32) -> (tempfile::TempDir, Tree) {
    let dir = tempdir().unwrap();
    let tree = Tree::open(dir.path().join("bench.ftree"), 4096, order, 16, 64, 1024).unwrap();
    for k in 0..n {
        tree.insert(&k.to_le_bytes(), &[0u8; 64], false).unwrap();
    }
    (dir, tree)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for order in [4u32, 64, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, &order| {
            b.iter_batched(
                || {
                    let dir = tempdir().unwrap();
                    let tree = Tree::open(dir.path().join("bench.ftree"), 4096, order, 16, 64, 1024).unwrap();
                    (dir, tree)
                },
                |(_dir, tree)| {
                    for k in 0..2000u32 {
                        tree.insert(&k.to_le_bytes(), &[0u8; 64], false).unwrap();
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    for order in [4u32, 64, 128] {
        let (_dir, tree) = populated(order, 10_000);
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, _| {
            b.iter(|| {
                for k in (0..10_000u32).step_by(17) {
                    criterion::black_box(tree.get(&k.to_le_bytes()).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_scan");
    for order in [4u32, 64, 128] {
        let (_dir, tree) = populated(order, 10_000);
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, _| {
            b.iter(|| {
                let start = 1000u32.to_le_bytes();
                let stop = 9000u32.to_le_bytes();
                for item in tree.range_scan(Some(&start), Some(&stop)).unwrap() {
                    criterion::black_box(item.unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_range_scan);
criterion_main!(benches);
