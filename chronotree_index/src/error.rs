// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Insertion errors.

use crate::types::Point3;

/// Why [`Octree::add`](crate::Octree::add) rejected a leaf.
///
/// Both variants leave the tree untouched.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum InsertError {
    /// The position lies outside the root bounding cube.
    #[error("position {position:?} is outside the indexed volume")]
    OutOfBounds {
        /// The rejected position.
        position: Point3,
    },
    /// Making room would need a node deeper than the configured maximum.
    #[error("insertion needs depth {depth}, limit is {limit}")]
    DepthExceeded {
        /// Depth the split would have reached.
        depth: u32,
        /// Configured `maximum_depth`.
        limit: u32,
    },
}
