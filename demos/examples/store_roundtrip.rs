// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store round trip.
//!
//! Record a session's payloads into a store, checkpoint, then reopen it and
//! restore only the part of the canvas a viewer is looking at.
//!
//! Run:
//! - `cargo run -p chronotree_demos --example store_roundtrip`

use chronotree_index::{Cube, Octree, OctreeConfig, Point3};
use chronotree_store::{MappedTree, StoreError};
use kurbo::{Point, Rect};

fn main() -> Result<(), StoreError> {
    colog::basic_builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("chronotree_store", log::LevelFilter::Debug)
        .init();

    let dir = tempfile::tempdir().expect("temporary directory");
    let canvas = Rect::new(0.0, 0.0, 1000.0, 1000.0);
    let bounds = Cube::from_rect(canvas, 0.0, 120.0);

    // Session one: draw a diagonal line, one payload per sample.
    {
        let mut store = MappedTree::open(dir.path(), "session")?;
        let mut ids = store.resume_ids()?;
        let mut tree = Octree::new(bounds, OctreeConfig::default(), &mut ids);
        for i in 0..200_u32 {
            let f = f64::from(i) * 5.0;
            let p = Point::new(f, f);
            let payload = format!("sample {i} at {p:?}");
            let leaf_data = store.append_payload(payload.as_bytes(), &mut ids)?;
            tree.add(leaf_data, Point3::from_point(p, f64::from(i) * 0.5), &mut ids)
                .expect("sample is on the canvas");
        }
        let summary = store.checkpoint(&tree, ids.last_id())?;
        println!("checkpoint: {summary:?}");
        store.close()?;
    }

    // Session two: a viewer zoomed into a 100x100 region.
    let store = MappedTree::open(dir.path(), "session")?;
    let viewport = Cube::from_rect(Rect::new(200.0, 200.0, 300.0, 300.0), 0.0, 120.0);
    let mut tree = Octree::with_root_id(bounds, OctreeConfig::default(), 0);
    let Some(summary) = store.restore(Some(&viewport), &mut tree)? else {
        println!("nothing was ever checkpointed");
        return Ok(());
    };
    println!("restore: {summary:?}");
    assert!(tree.is_partial());

    let mut visible = tree.elements_in(&viewport);
    visible.sort_unstable();
    for leaf_data in &visible {
        let bytes = store.read_payload(*leaf_data)?;
        println!("{}", String::from_utf8_lossy(&bytes));
    }
    assert_eq!(visible.len(), 21, "samples 40..=60 lie in the viewport");

    // A partial tree must not overwrite the full one.
    let mut store = store;
    let err = store.serialize_tree(&tree).unwrap_err();
    println!("write-back refused: {err}");
    Ok(())
}
