// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use chronotree_index::{Cube, MonotonicIds, Octree, OctreeConfig, Point3};
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

const CANVAS: f32 = 1024.0;
const SESSION: f64 = 3600.0;

fn bounds() -> Cube {
    Cube::new(Point3::new(0.0, 0.0, 0.0), Point3::new(CANVAS, CANVAS, SESSION))
}

/// Uniform points over the whole canvas and session.
fn gen_random_points(count: usize, seed: u64) -> Vec<Point3> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            Point3::new(
                rng.next_f64() as f32 * CANVAS,
                rng.next_f64() as f32 * CANVAS,
                rng.next_f64() * SESSION,
            )
        })
        .collect()
}

/// A pen stroke: a slow random walk, sampled every 10ms.
fn gen_stroke_points(count: usize, seed: u64) -> Vec<Point3> {
    let mut rng = Rng::new(seed);
    let (mut x, mut y) = (CANVAS / 2.0, CANVAS / 2.0);
    (0..count)
        .map(|i| {
            x = (x + (rng.next_f64() as f32 - 0.5) * 8.0).clamp(0.0, CANVAS);
            y = (y + (rng.next_f64() as f32 - 0.5) * 8.0).clamp(0.0, CANVAS);
            Point3::new(x, y, (i as f64 * 0.01).min(SESSION))
        })
        .collect()
}

fn build(points: &[Point3], max_leaves: usize) -> Octree {
    let mut ids = MonotonicIds::new();
    let mut tree = Octree::new(bounds(), OctreeConfig::with_max_leaves(max_leaves), &mut ids);
    for (i, p) in points.iter().copied().enumerate() {
        let _ = tree.add(i as u64, p, &mut ids);
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_insert");
    for &n in &[1_000usize, 10_000, 50_000] {
        let points = gen_random_points(n, 0x9e37_79b9);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("random_n{}", n), |b| {
            b.iter_batched(
                MonotonicIds::new,
                |mut ids| {
                    let mut tree =
                        Octree::new(bounds(), OctreeConfig::default(), &mut ids);
                    for (i, p) in points.iter().copied().enumerate() {
                        let _ = tree.add(i as u64, p, &mut ids);
                    }
                    black_box(tree.node_count());
                },
                BatchSize::SmallInput,
            )
        });
    }
    let stroke = gen_stroke_points(20_000, 7);
    group.throughput(Throughput::Elements(stroke.len() as u64));
    for &cap in &[4usize, 10, 32] {
        group.bench_function(format!("stroke_cap{}", cap), |b| {
            b.iter(|| black_box(build(&stroke, cap).node_count()))
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_query");
    let points = gen_random_points(50_000, 42);
    let tree = build(&points, 10);
    group.bench_function("elements_in_many_windows", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for q in 0..256 {
                let x = (q % 16) as f32 * 64.0;
                let y = (q / 16) as f32 * 64.0;
                let t = f64::from(q) * 10.0;
                let window = Cube::new(
                    Point3::new(x, y, t),
                    Point3::new(x + 128.0, y + 128.0, t + 600.0),
                );
                total += tree.elements_in(&window).len();
            }
            black_box(total);
        })
    });
    group.bench_function("elements_at_every_point", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for p in points.iter().take(4096) {
                total += tree.elements_at(*p).len();
            }
            black_box(total);
        })
    });
    group.bench_function("breadth_first_walk", |b| {
        b.iter(|| black_box(tree.breadth_first().map(|n| n.leaves().len()).sum::<usize>()))
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_query);
criterion_main!(benches);
