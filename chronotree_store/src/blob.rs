// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Variable-length records kept in the blob file.

use bitcode::{Decode, Encode};
use chronotree_index::{Leaf, Point3, RecordId};

use crate::error::{StoreError, StoreFile};

/// Leaf ids held by one leaf-bearing node, indexed under the node's id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct NodeRecord {
    /// Leaf ids in insertion order.
    pub leaf_ids: Vec<RecordId>,
}

/// One leaf, indexed under its own id.
///
/// Fields are flat so the blob format does not depend on the layout of
/// [`Point3`].
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
pub struct LeafDescriptor {
    /// Opaque payload id.
    pub leaf_data: u64,
    /// Canvas x.
    pub x: f32,
    /// Canvas y.
    pub y: f32,
    /// Time.
    pub t: f64,
    /// Leaf record id.
    pub id: RecordId,
}

impl From<Leaf> for LeafDescriptor {
    fn from(leaf: Leaf) -> Self {
        Self {
            leaf_data: leaf.leaf_data,
            x: leaf.position.x,
            y: leaf.position.y,
            t: leaf.position.t,
            id: leaf.id,
        }
    }
}

impl From<LeafDescriptor> for Leaf {
    fn from(desc: LeafDescriptor) -> Self {
        Self {
            leaf_data: desc.leaf_data,
            position: Point3::new(desc.x, desc.y, desc.t),
            id: desc.id,
        }
    }
}

pub(crate) fn decode<T: bitcode::DecodeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bitcode::decode(bytes).map_err(|source| StoreError::Decode {
        file: StoreFile::Blob,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_carries_the_whole_leaf() {
        let leaf = Leaf {
            leaf_data: 42,
            position: Point3::new(1.5, -2.0, 1234.125),
            id: 9,
        };
        let bytes = bitcode::encode(&LeafDescriptor::from(leaf));
        let back: LeafDescriptor = decode(&bytes).unwrap();
        assert_eq!(Leaf::from(back), leaf);
    }

    #[test]
    fn truncated_node_record_is_a_decode_error() {
        let bytes = bitcode::encode(&NodeRecord {
            leaf_ids: vec![1, 2, 3, 4],
        });
        let err = decode::<NodeRecord>(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, StoreError::Decode { file: StoreFile::Blob, .. }));
        assert!(err.is_corruption());
    }
}
