// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chronotree Index: a spatiotemporal octree over (x, y, time).
//!
//! Chronotree Index is the in-memory half of a persistent index for recorded
//! drawings. Every stroke segment, sample, or other payload is stored elsewhere
//! and addressed by an opaque `u64`; this crate only knows where in space and
//! time that id lives.
//!
//! - Insert payload ids at a [`Point3`] with [`Octree::add`]; full nodes split
//!   into eight octants and redistribute their leaves.
//! - Query by point ([`Octree::elements_at`]) or by bounding [`Cube`]
//!   ([`Octree::elements_in`]).
//! - Every node carries a persisted record id and an [`Occupancy`] byte, which
//!   is all a store needs to write the tree breadth-first and rebuild it later
//!   with [`Octree::split`] and [`Octree::push_leaf`].
//!
//! Ids come from an [`IdAllocator`]. [`MonotonicIds`] is the usual choice; any
//! `FnMut() -> RecordId` closure works too.
//!
//! # Example
//!
//! ```rust
//! use chronotree_index::{Cube, MonotonicIds, Octree, OctreeConfig, Point3};
//!
//! let bounds = Cube::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
//! let mut ids = MonotonicIds::new();
//! let mut tree = Octree::new(bounds, OctreeConfig::with_max_leaves(1), &mut ids);
//!
//! tree.add(99, Point3::new(9.0, 9.0, 9.0), &mut ids).unwrap();
//! tree.add(88, Point3::new(1.0, 1.0, 1.0), &mut ids).unwrap();
//!
//! // The root split: slot 2 holds the all-low octant, slot 4 the all-high one.
//! assert_eq!(tree.encode_child_occupancy(tree.root()), 0b0001_0100);
//!
//! let mut hits = tree.elements_in(&bounds);
//! hits.sort_unstable();
//! assert_eq!(hits, [88, 99]);
//! ```
//!
//! ## Octant slots
//!
//! Bisection halves time first (slots `0..4` are the earlier half), then
//! orders the `(x, y)` quadrants as `+x+y`, `-x+y`, `-x-y`, `+x-y`. Points on a
//! split plane go to the lowest containing slot, both when inserting and when
//! looking up.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for coordinates.
//! Time is `f64` so long sessions keep sub-millisecond resolution.

#![no_std]

extern crate alloc;

pub mod error;
pub mod ids;
pub mod occupancy;
pub mod octree;
pub mod queue;
pub mod types;

pub use error::InsertError;
pub use ids::{IdAllocator, MonotonicIds, RecordId};
pub use occupancy::Occupancy;
pub use octree::{BreadthFirst, Leaf, NodeKey, NodeView, Octree, OctreeConfig};
pub use queue::{LinkedList, ListKey, Queue};
pub use types::{Cube, OCTANT_COUNT, Point3};
