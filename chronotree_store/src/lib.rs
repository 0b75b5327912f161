// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chronotree Store: file-backed persistence for a chronotree [`Octree`].
//!
//! A [`MappedTree`] is a named store of four files in one directory. Caller
//! payloads and the tree's own records live in an append-only blob file and
//! are addressed by record id through a fixed-width page table. The tree shape
//! is written breadth-first, one `(id, occupancy)` record per node, which lets
//! [`MappedTree::restore`] rebuild the tree by streaming that file once and,
//! given a filter [`Cube`], skip every subtree outside the region of interest.
//!
//! # Example
//!
//! ```rust
//! use chronotree_index::{Cube, MonotonicIds, Octree, OctreeConfig, Point3};
//! use chronotree_store::MappedTree;
//!
//! let dir = tempfile::tempdir()?;
//! let mut store = MappedTree::open(dir.path(), "session")?;
//! let mut ids = MonotonicIds::new();
//!
//! let bounds = Cube::new(Point3::new(0.0, 0.0, 0.0), Point3::new(100.0, 100.0, 60.0));
//! let mut tree = Octree::new(bounds, OctreeConfig::default(), &mut ids);
//! let stroke = store.append_payload(b"M 10 10 L 20 20", &mut ids)?;
//! tree.add(stroke, Point3::new(15.0, 15.0, 1.5), &mut ids).unwrap();
//! store.checkpoint(&tree, ids.last_id())?;
//!
//! let mut restored = Octree::with_root_id(bounds, OctreeConfig::default(), 0);
//! store.restore(None, &mut restored)?;
//! for leaf_data in restored.elements_in(&bounds) {
//!     assert_eq!(store.read_payload(leaf_data)?, b"M 10 10 L 20 20");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Durability
//!
//! [`MappedTree::checkpoint`] writes the meta record last. A crash before that
//! leaves the previous meta in place, and since leaf descriptors are
//! immutable and the blob file is append-only, the previous checkpoint's tree
//! file is the only thing at risk. There is no cross-file atomicity beyond
//! that ordering.
//!
//! [`Octree`]: chronotree_index::Octree
//! [`Cube`]: chronotree_index::Cube

mod blob;
mod error;
mod files;
mod mapped_tree;
mod records;

pub use blob::{LeafDescriptor, NodeRecord};
pub use error::{Result, StoreError, StoreFile};
pub use mapped_tree::{MappedTree, RestoreSummary, SerializeSummary, StoreOptions};
pub use records::{
    INDEX_RECORD_SIZE, IndexRecord, META_MAGIC, META_RECORD_SIZE, META_VERSION, MetaTree,
    RecordKind, TREE_NODE_RECORD_SIZE, TreeNodeRecord,
};
