// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Octree basics.
//!
//! Index a few stroke samples drawn on a 2-D canvas, watch the root split, and
//! query by time window and by point.
//!
//! Run:
//! - `cargo run -p chronotree_demos --example octree_basics`

use chronotree_index::{Cube, InsertError, MonotonicIds, Octree, OctreeConfig, Point3};
use kurbo::{Point, Rect};

fn main() {
    colog::basic_builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("chronotree_index", log::LevelFilter::Debug)
        .init();

    // A 800x600 canvas recorded for one minute.
    let canvas = Rect::new(0.0, 0.0, 800.0, 600.0);
    let bounds = Cube::from_rect(canvas, 0.0, 60.0);
    let mut ids = MonotonicIds::new();
    let mut tree = Octree::new(bounds, OctreeConfig::with_max_leaves(2), &mut ids);

    // Four samples: two early strokes top-left, two late ones bottom-right.
    let samples = [
        (Point::new(40.0, 30.0), 1.0),
        (Point::new(60.0, 45.0), 2.5),
        (Point::new(700.0, 500.0), 50.0),
        (Point::new(720.0, 540.0), 55.0),
    ];
    for (leaf_data, (p, t)) in (100_u64..).zip(samples) {
        tree.add(leaf_data, Point3::from_point(p, t), &mut ids)
            .expect("sample is on the canvas");
    }
    println!(
        "root occupancy: {:#010b}, {} nodes",
        tree.encode_child_occupancy(tree.root()),
        tree.node_count()
    );

    // Everything drawn in the first ten seconds, anywhere on the canvas.
    let early = Cube::from_rect(canvas, 0.0, 10.0);
    let mut hits = tree.elements_in(&early);
    hits.sort_unstable();
    println!("first ten seconds: {hits:?}");
    assert_eq!(hits, [100, 101], "only the early samples");

    // The leaf-bearing node under a point holds its neighbours too.
    let near = tree.elements_at(Point3::from_point(Point::new(710.0, 520.0), 52.0));
    println!("around (710, 520) at 52s: {near:?}");

    // Off-canvas samples are rejected and leave the tree untouched.
    let before = tree.leaf_count();
    let err = tree
        .add(7, Point3::from_point(Point::new(900.0, 10.0), 5.0), &mut ids)
        .unwrap_err();
    assert!(matches!(err, InsertError::OutOfBounds { .. }));
    assert_eq!(tree.leaf_count(), before);
    println!("rejected: {err}");

    for node in tree.breadth_first() {
        println!(
            "depth {} id {:>2} spans {:?} holds {:?}",
            node.depth(),
            node.id(),
            node.cube().spatial_rect(),
            node.leaves().iter().map(|l| l.leaf_data).collect::<Vec<_>>()
        );
    }
}
