// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-width on-disk records.
//!
//! All integers and floats are little-endian. The page table is addressed by
//! `id * INDEX_RECORD_SIZE`, so these widths are part of the file format.

use chronotree_index::{Cube, Occupancy, Point3, RecordId};

use crate::error::{StoreError, StoreFile};

/// Width of one page-table entry.
pub const INDEX_RECORD_SIZE: usize = 11;
/// Width of one tree-shape entry.
pub const TREE_NODE_RECORD_SIZE: usize = 9;
/// Width of the meta file.
pub const META_RECORD_SIZE: usize = 46;

/// Leading bytes of every meta file.
pub const META_MAGIC: [u8; 4] = *b"CHTM";
/// Meta format version written by this crate.
pub const META_VERSION: u16 = 1;

/// What a page-table entry points at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    /// Caller payload bytes.
    Payload = 1,
    /// The leaf id list of a leaf-bearing node.
    NodeLeaves = 2,
    /// A single leaf: payload id, position, and leaf id.
    LeafDescriptor = 3,
}

impl RecordKind {
    fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Payload),
            2 => Some(Self::NodeLeaves),
            3 => Some(Self::LeafDescriptor),
            _ => None,
        }
    }
}

/// Page-table entry: where a record lives in the blob file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset in the blob file.
    pub offset: i64,
    /// Record length in bytes.
    pub size: u16,
    /// What the record holds.
    pub kind: RecordKind,
}

impl IndexRecord {
    /// Encode to the on-disk layout.
    pub fn encode(&self) -> [u8; INDEX_RECORD_SIZE] {
        let mut out = [0_u8; INDEX_RECORD_SIZE];
        out[0..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..10].copy_from_slice(&self.size.to_le_bytes());
        out[10] = self.kind as u8;
        out
    }

    /// Decode an entry; `Ok(None)` for a slot that was never written.
    pub fn decode(bytes: &[u8; INDEX_RECORD_SIZE]) -> Result<Option<Self>, StoreError> {
        if bytes[10] == 0 {
            return Ok(None);
        }
        let kind = RecordKind::from_u8(bytes[10]).ok_or_else(|| {
            StoreError::corrupt(StoreFile::Index, format!("unknown record kind {}", bytes[10]))
        })?;
        let offset = i64::from_le_bytes(take(bytes, 0));
        if offset < 0 {
            return Err(StoreError::corrupt(
                StoreFile::Index,
                format!("negative blob offset {offset}"),
            ));
        }
        Ok(Some(Self {
            offset,
            size: u16::from_le_bytes(take(bytes, 8)),
            kind,
        }))
    }
}

/// One node in the breadth-first tree-shape file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TreeNodeRecord {
    /// The node's record id.
    pub id: RecordId,
    /// Which child slots follow later in the stream.
    pub occupancy: Occupancy,
}

impl TreeNodeRecord {
    /// Encode to the on-disk layout.
    pub fn encode(&self) -> [u8; TREE_NODE_RECORD_SIZE] {
        let mut out = [0_u8; TREE_NODE_RECORD_SIZE];
        out[0..8].copy_from_slice(&self.id.to_le_bytes());
        out[8] = self.occupancy.bits();
        out
    }

    /// Decode an entry. Every occupancy byte is valid.
    pub fn decode(bytes: &[u8; TREE_NODE_RECORD_SIZE]) -> Self {
        Self {
            id: RecordId::from_le_bytes(take(bytes, 0)),
            occupancy: Occupancy::from_bits_retain(bytes[8]),
        }
    }
}

/// Store-wide metadata, written last at every checkpoint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MetaTree {
    /// Root bounding cube.
    pub bounds: Cube,
    /// Highest id handed out when the checkpoint was taken.
    pub last_id: RecordId,
}

impl MetaTree {
    /// Encode to the on-disk layout, header included.
    pub fn encode(&self) -> [u8; META_RECORD_SIZE] {
        let mut out = [0_u8; META_RECORD_SIZE];
        out[0..4].copy_from_slice(&META_MAGIC);
        out[4..6].copy_from_slice(&META_VERSION.to_le_bytes());
        put_point(&mut out[6..22], self.bounds.min);
        put_point(&mut out[22..38], self.bounds.max);
        out[38..46].copy_from_slice(&self.last_id.to_le_bytes());
        out
    }

    /// Decode and validate the header.
    pub fn decode(bytes: &[u8; META_RECORD_SIZE]) -> Result<Self, StoreError> {
        if bytes[0..4] != META_MAGIC {
            return Err(StoreError::corrupt(StoreFile::Meta, "bad magic"));
        }
        let version = u16::from_le_bytes(take(bytes, 4));
        if version != META_VERSION {
            return Err(StoreError::corrupt(
                StoreFile::Meta,
                format!("unsupported format version {version}"),
            ));
        }
        let bounds = Cube::new(get_point(bytes, 6), get_point(bytes, 22));
        if bounds.is_empty() {
            return Err(StoreError::corrupt(StoreFile::Meta, "empty bounds"));
        }
        Ok(Self {
            bounds,
            last_id: RecordId::from_le_bytes(take(bytes, 38)),
        })
    }
}

fn take<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0_u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

fn put_point(out: &mut [u8], p: Point3) {
    out[0..4].copy_from_slice(&p.x.to_le_bytes());
    out[4..8].copy_from_slice(&p.y.to_le_bytes());
    out[8..16].copy_from_slice(&p.t.to_le_bytes());
}

fn get_point(bytes: &[u8], at: usize) -> Point3 {
    Point3::new(
        f32::from_le_bytes(take(bytes, at)),
        f32::from_le_bytes(take(bytes, at + 4)),
        f64::from_le_bytes(take(bytes, at + 8)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_record_layout_is_little_endian() {
        let rec = IndexRecord {
            offset: 0x0102,
            size: 0x0304,
            kind: RecordKind::LeafDescriptor,
        };
        assert_eq!(rec.encode(), [2, 1, 0, 0, 0, 0, 0, 0, 4, 3, 3]);
    }

    #[test]
    fn zeroed_index_slot_is_empty() {
        assert_eq!(IndexRecord::decode(&[0; INDEX_RECORD_SIZE]).unwrap(), None);
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut bytes = [0; INDEX_RECORD_SIZE];
        bytes[10] = 200;
        let err = IndexRecord::decode(&bytes).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn tree_record_keeps_all_occupancy_bits() {
        let rec = TreeNodeRecord {
            id: -5,
            occupancy: Occupancy::from_bits_retain(0xff),
        };
        let bytes = rec.encode();
        assert_eq!(bytes[8], 0xff);
        assert_eq!(TreeNodeRecord::decode(&bytes), rec);
    }

    #[test]
    fn meta_header_is_checked() {
        let meta = MetaTree {
            bounds: Cube::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.5)),
            last_id: 77,
        };
        let mut bytes = meta.encode();
        assert_eq!(&bytes[0..4], b"CHTM");
        assert_eq!(MetaTree::decode(&bytes).unwrap(), meta);

        bytes[4] = 9;
        assert!(MetaTree::decode(&bytes).unwrap_err().is_corruption());
        bytes[0] = b'X';
        assert!(matches!(
            MetaTree::decode(&bytes),
            Err(StoreError::Corrupt { file: StoreFile::Meta, .. })
        ));
    }
}
