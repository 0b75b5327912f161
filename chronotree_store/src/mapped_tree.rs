// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`MappedTree`]: a named, file-backed store for an [`Octree`] and its payloads.

use std::path::{Path, PathBuf};

use chronotree_index::{Cube, IdAllocator, Leaf, MonotonicIds, NodeKey, Octree, Queue, RecordId};

use crate::blob::{self, LeafDescriptor, NodeRecord};
use crate::error::{Result, StoreError, StoreFile};
use crate::files::StoreFiles;
use crate::records::{IndexRecord, MetaTree, RecordKind, TreeNodeRecord};

/// How a store is opened and committed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Discard any existing contents when opening.
    pub truncate: bool,
    /// `fsync` all four files at the end of every [`MappedTree::checkpoint`].
    pub sync_on_checkpoint: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            truncate: false,
            sync_on_checkpoint: true,
        }
    }
}

/// What [`MappedTree::serialize_tree`] wrote.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializeSummary {
    /// Tree-shape records written.
    pub nodes: usize,
    /// Depth rows flushed to the tree-shape file.
    pub rows: usize,
    /// Leaf-id lists written for leaf-bearing nodes.
    pub node_records: usize,
    /// Leaf descriptors written for the first time.
    pub leaves_written: usize,
    /// Leaves whose descriptor was already on disk.
    pub leaves_reused: usize,
}

/// What [`MappedTree::restore`] rebuilt.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Tree-shape records consumed from the stream.
    pub nodes_read: usize,
    /// Nodes rebuilt in memory, root included.
    pub nodes_materialized: usize,
    /// Nodes consumed but pruned by the filter.
    pub nodes_skipped: usize,
    /// Leaves placed into the tree.
    pub leaves_loaded: usize,
    /// Leaves read from intersecting nodes but outside the filter.
    pub leaves_filtered: usize,
    /// Whether the rebuilt tree covers less than the whole store.
    pub partial: bool,
}

/// Work queue entry while streaming the tree-shape file.
#[derive(Copy, Clone, Debug)]
enum Pending {
    /// Rebuild the next record as child `slot` of `parent`.
    Expand { parent: NodeKey, slot: usize },
    /// Consume the next record without rebuilding it.
    Skip,
}

/// A persistent octree store made of four files in one directory:
/// `<name>.blob`, `<name>.idx`, `<name>.tree` and `<name>.meta`.
///
/// - The blob file is append-only and holds payloads, per-node leaf lists and
///   leaf descriptors.
/// - The index file is a page table: entry `id` sits at `id * 11` and says
///   where record `id` lives in the blob file.
/// - The tree file lists every node breadth-first as `(id, occupancy)`; it is
///   rewritten at every serialization.
/// - The meta file holds the root bounds and the id high-water mark. It is
///   written last, so a store without one has never been checkpointed.
///
/// Access is single-threaded and blocking.
#[derive(Debug)]
pub struct MappedTree {
    files: StoreFiles,
    options: StoreOptions,
}

impl MappedTree {
    /// Open or create the store `name` in `dir` with default options.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::open_with(dir, name, StoreOptions::default())
    }

    /// Open or create the store `name` in `dir`.
    pub fn open_with(dir: impl AsRef<Path>, name: &str, options: StoreOptions) -> Result<Self> {
        let files = StoreFiles::open(dir.as_ref(), name, options.truncate)?;
        log::debug!(
            "opened store {name:?} in {} ({} blob bytes)",
            dir.as_ref().display(),
            files.blob_len()
        );
        Ok(Self { files, options })
    }

    /// Options the store was opened with.
    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// On-disk path of one of the store's files.
    pub fn path(&self, file: StoreFile) -> PathBuf {
        self.files.path(file)
    }

    /// Append raw bytes to the blob file; returns their offset.
    pub fn write_op(&mut self, bytes: &[u8]) -> Result<u64> {
        self.files.append_blob(bytes)
    }

    /// Read `len` bytes at `offset` from the blob file.
    pub fn read_op(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.files.read_blob(offset, len)
    }

    /// Store the page-table entry for `id`.
    pub fn write_index(&mut self, id: RecordId, record: IndexRecord) -> Result<()> {
        self.files.write_index(id, &record)
    }

    /// Page-table entry for `id`, or `None` if it was never written.
    pub fn read_index(&self, id: RecordId) -> Result<Option<IndexRecord>> {
        self.files.read_index(id)
    }

    /// Store a caller payload under a fresh id and return that id as the
    /// `leaf_data` to index it by.
    pub fn append_payload(&mut self, bytes: &[u8], ids: &mut impl IdAllocator) -> Result<u64> {
        let id = ids.next_id();
        let leaf_data = u64::try_from(id).map_err(|_| StoreError::UnknownId { id })?;
        self.write_record(id, RecordKind::Payload, bytes)?;
        Ok(leaf_data)
    }

    /// Fetch a payload stored by [`MappedTree::append_payload`].
    pub fn read_payload(&self, leaf_data: u64) -> Result<Vec<u8>> {
        let id = RecordId::try_from(leaf_data)
            .map_err(|_| StoreError::UnknownPayload { leaf_data })?;
        match self.read_index(id)? {
            Some(rec) if rec.kind == RecordKind::Payload => self.read_located(&rec),
            _ => Err(StoreError::UnknownId { id }),
        }
    }

    /// Write the shape and leaves of `tree`.
    ///
    /// Nodes go to the tree file in breadth-first order, one depth row at a
    /// time. Each leaf-bearing node gets a [`NodeRecord`] under its id, and
    /// each leaf a [`LeafDescriptor`] under its own id. Leaves never change,
    /// so a descriptor already in the page table is not written again. A leaf
    /// id whose entry holds any other kind of record is reported as
    /// corruption.
    ///
    /// A partially restored tree is refused with [`StoreError::PartialTree`].
    pub fn serialize_tree(&mut self, tree: &Octree) -> Result<SerializeSummary> {
        if tree.is_partial() {
            return Err(StoreError::PartialTree);
        }
        self.files.truncate_tree()?;

        let mut summary = SerializeSummary::default();
        let mut queue = Queue::new();
        queue.push(tree.root());
        let mut row = Vec::new();
        let mut current_depth = 0;

        while let Some(key) = queue.pop() {
            let Some(node) = tree.node(key) else {
                continue;
            };
            if node.depth() > current_depth {
                self.flush_row(&mut row, current_depth, &mut summary)?;
                current_depth = node.depth();
            }
            let record = TreeNodeRecord {
                id: node.id(),
                occupancy: node.occupancy(),
            };
            row.extend_from_slice(&record.encode());
            summary.nodes += 1;

            if node.is_leaf_bearing() {
                let leaves = node.leaves();
                let list = NodeRecord {
                    leaf_ids: leaves.iter().map(|leaf| leaf.id).collect(),
                };
                self.write_record(node.id(), RecordKind::NodeLeaves, &bitcode::encode(&list))?;
                summary.node_records += 1;
                for leaf in leaves {
                    match self.read_index(leaf.id)? {
                        Some(rec) if rec.kind == RecordKind::LeafDescriptor => {
                            summary.leaves_reused += 1;
                            continue;
                        }
                        Some(rec) => {
                            let reason =
                                format!("leaf id {} already holds a {:?} record", leaf.id, rec.kind);
                            return Err(StoreError::corrupt(StoreFile::Index, reason));
                        }
                        None => {}
                    }
                    let desc = LeafDescriptor::from(*leaf);
                    self.write_record(leaf.id, RecordKind::LeafDescriptor, &bitcode::encode(&desc))?;
                    summary.leaves_written += 1;
                }
            } else {
                queue.extend(node.children().map(|(_, child)| child));
            }
        }
        self.flush_row(&mut row, current_depth, &mut summary)?;
        Ok(summary)
    }

    /// Overwrite the meta file.
    pub fn write_meta_tree(&mut self, meta: &MetaTree) -> Result<()> {
        self.files.write_meta(meta)
    }

    /// The stored meta record, or `None` if nothing was ever checkpointed.
    pub fn read_meta_tree(&self) -> Result<Option<MetaTree>> {
        self.files.read_meta()
    }

    /// Serialize `tree`, then commit by writing the meta record with
    /// `last_id` as the id high-water mark.
    ///
    /// Files are synced afterwards when [`StoreOptions::sync_on_checkpoint`]
    /// is set.
    pub fn checkpoint(&mut self, tree: &Octree, last_id: RecordId) -> Result<SerializeSummary> {
        let summary = self.serialize_tree(tree)?;
        self.write_meta_tree(&MetaTree {
            bounds: tree.bounds(),
            last_id,
        })?;
        if self.options.sync_on_checkpoint {
            self.files.sync()?;
        } else {
            self.files.flush()?;
        }
        log::debug!("checkpoint at id {last_id}: {summary:?}");
        Ok(summary)
    }

    /// An allocator that continues after the last checkpointed id.
    pub fn resume_ids(&self) -> Result<MonotonicIds> {
        let last = self.read_meta_tree()?.map_or(0, |meta| meta.last_id);
        Ok(MonotonicIds::starting_after(last))
    }

    /// Rebuild `tree` from the store.
    ///
    /// Returns `Ok(None)`, leaving `tree` alone, if the store was never
    /// checkpointed. Otherwise `tree` is reset to the stored bounds and
    /// rebuilt.
    ///
    /// With a `filter`, only subtrees whose cube intersects it are rebuilt and
    /// only leaves inside it are kept; the result is then marked partial
    /// unless the filter covers the whole store. If the filter misses the
    /// root entirely, the tree is left as an empty root without reading the
    /// tree file.
    ///
    /// On error the tree is marked partial, so it can never be written back.
    pub fn restore(
        &self,
        filter: Option<&Cube>,
        tree: &mut Octree,
    ) -> Result<Option<RestoreSummary>> {
        let Some(meta) = self.read_meta_tree()? else {
            return Ok(None);
        };
        let placeholder = tree.node(tree.root()).map_or(0, |root| root.id());
        tree.reset(meta.bounds, placeholder);

        let mut summary = RestoreSummary::default();
        if let Some(filter) = filter {
            let covers = filter.contains(meta.bounds.min) && filter.contains(meta.bounds.max);
            if !covers {
                tree.mark_partial();
                summary.partial = true;
            }
            if !filter.intersects(&meta.bounds) {
                log::debug!("restore filter misses the stored bounds");
                return Ok(Some(summary));
            }
        }

        match self.stream_into(filter, tree, &mut summary) {
            Ok(()) => {
                log::debug!("restored {summary:?}");
                Ok(Some(summary))
            }
            Err(err) => {
                if err.is_corruption() {
                    log::warn!("restore stopped on corrupt store: {err}");
                }
                tree.mark_partial();
                Err(err)
            }
        }
    }

    /// Flush and sync all files, then close them.
    pub fn close(mut self) -> Result<()> {
        self.files.sync()
    }

    fn stream_into(
        &self,
        filter: Option<&Cube>,
        tree: &mut Octree,
        summary: &mut RestoreSummary,
    ) -> Result<()> {
        let mut reader = self.files.tree_reader()?;
        let root = reader
            .next_record()?
            .ok_or_else(|| StoreError::corrupt(StoreFile::Tree, "missing root record"))?;
        summary.nodes_read += 1;
        tree.set_root_id(root.id);

        let mut queue = Queue::new();
        let root_key = tree.root();
        self.rebuild_node(tree, root_key, root, filter, &mut queue, summary)?;

        while let Some(pending) = queue.pop() {
            let record = reader.next_record()?.ok_or_else(|| {
                StoreError::corrupt(StoreFile::Tree, "tree file ended before the last child")
            })?;
            summary.nodes_read += 1;
            match pending {
                Pending::Skip => {
                    summary.nodes_skipped += 1;
                    queue.extend(record.occupancy.high_bit_positions().map(|_| Pending::Skip));
                }
                Pending::Expand { parent, slot } => {
                    let child = tree.split(parent, record.id, slot);
                    self.rebuild_node(tree, child, record, filter, &mut queue, summary)?;
                }
            }
        }
        if reader.next_record()?.is_some() {
            log::warn!("tree file has records past the last child; ignoring them");
        }
        Ok(())
    }

    /// Queue the children of a rebuilt node, or load its leaves.
    fn rebuild_node(
        &self,
        tree: &mut Octree,
        key: NodeKey,
        record: TreeNodeRecord,
        filter: Option<&Cube>,
        queue: &mut Queue<Pending>,
        summary: &mut RestoreSummary,
    ) -> Result<()> {
        summary.nodes_materialized += 1;
        if !record.occupancy.is_empty() {
            let cube = tree.node(key).map(|n| n.cube()).unwrap_or_default();
            queue.extend(record.occupancy.high_bit_positions().map(|slot| {
                if filter.is_none_or(|f| f.intersects(&cube.octant(slot))) {
                    Pending::Expand { parent: key, slot }
                } else {
                    Pending::Skip
                }
            }));
            return Ok(());
        }

        let list: NodeRecord = blob::decode(&self.read_kind(record.id, RecordKind::NodeLeaves)?)?;
        for leaf_id in list.leaf_ids {
            let desc: LeafDescriptor =
                blob::decode(&self.read_kind(leaf_id, RecordKind::LeafDescriptor)?)?;
            let leaf = Leaf::from(desc);
            if filter.is_some_and(|f| !f.contains(leaf.position)) {
                summary.leaves_filtered += 1;
                continue;
            }
            tree.push_leaf(key, leaf);
            summary.leaves_loaded += 1;
        }
        Ok(())
    }

    fn flush_row(
        &mut self,
        row: &mut Vec<u8>,
        depth: u32,
        summary: &mut SerializeSummary,
    ) -> Result<()> {
        if row.is_empty() {
            return Ok(());
        }
        self.files.append_tree(row)?;
        log::trace!("flushed depth {depth} row, {} bytes", row.len());
        row.clear();
        summary.rows += 1;
        Ok(())
    }

    fn write_record(&mut self, id: RecordId, kind: RecordKind, bytes: &[u8]) -> Result<()> {
        let size = u16::try_from(bytes.len()).map_err(|_| StoreError::PayloadTooLarge {
            len: bytes.len(),
            max: usize::from(u16::MAX),
        })?;
        let offset = self.write_op(bytes)?;
        let offset = i64::try_from(offset)
            .map_err(|_| StoreError::corrupt(StoreFile::Blob, "blob file exceeds i64 offsets"))?;
        self.write_index(id, IndexRecord { offset, size, kind })
    }

    fn read_kind(&self, id: RecordId, kind: RecordKind) -> Result<Vec<u8>> {
        let rec = self.read_index(id)?.ok_or(StoreError::UnknownId { id })?;
        if rec.kind != kind {
            return Err(StoreError::corrupt(
                StoreFile::Index,
                format!("record {id} is {:?}, expected {kind:?}", rec.kind),
            ));
        }
        self.read_located(&rec)
    }

    fn read_located(&self, rec: &IndexRecord) -> Result<Vec<u8>> {
        let offset = u64::try_from(rec.offset)
            .map_err(|_| StoreError::corrupt(StoreFile::Index, "negative blob offset"))?;
        self.read_op(offset, usize::from(rec.size))
    }
}
