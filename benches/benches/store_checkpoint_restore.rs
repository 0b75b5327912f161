// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use chronotree_index::{Cube, MonotonicIds, Octree, OctreeConfig, Point3};
use chronotree_store::{MappedTree, StoreOptions};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn bounds() -> Cube {
    Cube::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1024.0, 1024.0, 3600.0))
}

fn gen_tree(n: usize, seed: u64) -> (Octree, MonotonicIds) {
    let mut rng = Rng::new(seed);
    let mut ids = MonotonicIds::new();
    let mut tree = Octree::new(bounds(), OctreeConfig::default(), &mut ids);
    for i in 0..n {
        let p = Point3::new(
            rng.next_f64() as f32 * 1024.0,
            rng.next_f64() as f32 * 1024.0,
            rng.next_f64() * 3600.0,
        );
        let _ = tree.add(i as u64, p, &mut ids);
    }
    (tree, ids)
}

fn no_sync() -> StoreOptions {
    StoreOptions {
        truncate: true,
        sync_on_checkpoint: false,
    }
}

fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_checkpoint");
    for &n in &[2_000usize, 20_000] {
        let (tree, ids) = gen_tree(n, 11);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("fresh_n{}", n), |b| {
            b.iter_batched(
                || tempfile::tempdir().unwrap(),
                |dir| {
                    let mut store = MappedTree::open_with(dir.path(), "bench", no_sync()).unwrap();
                    black_box(store.checkpoint(&tree, ids.last_id()).unwrap());
                    dir
                },
                BatchSize::PerIteration,
            )
        });
        // Every descriptor is already on disk; only the shape is rewritten.
        let dir = tempfile::tempdir().unwrap();
        let mut store = MappedTree::open_with(dir.path(), "bench", no_sync()).unwrap();
        store.checkpoint(&tree, ids.last_id()).unwrap();
        group.bench_function(format!("incremental_n{}", n), |b| {
            b.iter(|| black_box(store.checkpoint(&tree, ids.last_id()).unwrap()))
        });
    }
    group.finish();
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_restore");
    let (tree, ids) = gen_tree(20_000, 23);
    let dir = tempfile::tempdir().unwrap();
    let mut store = MappedTree::open_with(dir.path(), "bench", no_sync()).unwrap();
    store.checkpoint(&tree, ids.last_id()).unwrap();

    let mut scratch = Octree::with_root_id(bounds(), OctreeConfig::default(), 0);
    group.bench_function("full", |b| {
        b.iter(|| black_box(store.restore(None, &mut scratch).unwrap()))
    });
    let window = Cube::new(
        Point3::new(256.0, 256.0, 600.0),
        Point3::new(384.0, 384.0, 900.0),
    );
    group.bench_function("bounded_window", |b| {
        b.iter(|| black_box(store.restore(Some(&window), &mut scratch).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_checkpoint, bench_restore);
criterion_main!(benches);
