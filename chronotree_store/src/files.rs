// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The four open files behind a store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chronotree_index::RecordId;

use crate::error::{IoContext, Result, StoreError, StoreFile};
use crate::records::{
    INDEX_RECORD_SIZE, IndexRecord, META_RECORD_SIZE, MetaTree, TREE_NODE_RECORD_SIZE,
    TreeNodeRecord,
};

#[derive(Debug)]
pub(crate) struct StoreFiles {
    dir: PathBuf,
    name: String,
    blob: File,
    index: File,
    tree: File,
    meta: File,
    blob_len: u64,
}

impl StoreFiles {
    pub(crate) fn open(dir: &Path, name: &str, truncate: bool) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let open = |file: StoreFile| -> Result<File> {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(truncate)
                .open(path_of(dir, name, file))
                .on(file)
        };
        let blob = open(StoreFile::Blob)?;
        let index = open(StoreFile::Index)?;
        let tree = open(StoreFile::Tree)?;
        let meta = open(StoreFile::Meta)?;
        let blob_len = blob.metadata().on(StoreFile::Blob)?.len();
        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_owned(),
            blob,
            index,
            tree,
            meta,
            blob_len,
        })
    }

    pub(crate) fn path(&self, file: StoreFile) -> PathBuf {
        path_of(&self.dir, &self.name, file)
    }

    pub(crate) fn blob_len(&self) -> u64 {
        self.blob_len
    }

    pub(crate) fn append_blob(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.blob_len;
        let mut f = &self.blob;
        f.seek(SeekFrom::Start(offset)).on(StoreFile::Blob)?;
        f.write_all(bytes).on(StoreFile::Blob)?;
        self.blob_len += bytes.len() as u64;
        Ok(offset)
    }

    pub(crate) fn read_blob(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let len64 = len as u64;
        if offset.checked_add(len64).is_none_or(|end| end > self.blob_len) {
            return Err(StoreError::OutOfRange {
                file: StoreFile::Blob,
                offset,
                len: len64,
            });
        }
        let mut f = &self.blob;
        f.seek(SeekFrom::Start(offset)).on(StoreFile::Blob)?;
        let mut out = vec![0_u8; len];
        f.read_exact(&mut out).on(StoreFile::Blob)?;
        Ok(out)
    }

    pub(crate) fn write_index(&mut self, id: RecordId, record: &IndexRecord) -> Result<()> {
        let (at, _) = index_slot(id)?;
        let mut f = &self.index;
        f.seek(SeekFrom::Start(at)).on(StoreFile::Index)?;
        f.write_all(&record.encode()).on(StoreFile::Index)
    }

    pub(crate) fn read_index(&self, id: RecordId) -> Result<Option<IndexRecord>> {
        let (at, end) = index_slot(id)?;
        let len = self.index.metadata().on(StoreFile::Index)?.len();
        // Ids past the end of the page table were never written.
        if end > len {
            return Ok(None);
        }
        let mut f = &self.index;
        f.seek(SeekFrom::Start(at)).on(StoreFile::Index)?;
        let mut buf = [0_u8; INDEX_RECORD_SIZE];
        f.read_exact(&mut buf).on(StoreFile::Index)?;
        IndexRecord::decode(&buf)
    }

    pub(crate) fn truncate_tree(&mut self) -> Result<()> {
        self.tree.set_len(0).on(StoreFile::Tree)?;
        (&self.tree).seek(SeekFrom::Start(0)).on(StoreFile::Tree)?;
        Ok(())
    }

    pub(crate) fn append_tree(&mut self, bytes: &[u8]) -> Result<()> {
        (&self.tree).write_all(bytes).on(StoreFile::Tree)
    }

    pub(crate) fn tree_reader(&self) -> Result<TreeReader<'_>> {
        let mut f = &self.tree;
        f.seek(SeekFrom::Start(0)).on(StoreFile::Tree)?;
        Ok(TreeReader {
            inner: BufReader::new(f),
        })
    }

    pub(crate) fn write_meta(&mut self, meta: &MetaTree) -> Result<()> {
        let mut f = &self.meta;
        f.seek(SeekFrom::Start(0)).on(StoreFile::Meta)?;
        f.write_all(&meta.encode()).on(StoreFile::Meta)?;
        self.meta.set_len(META_RECORD_SIZE as u64).on(StoreFile::Meta)
    }

    pub(crate) fn read_meta(&self) -> Result<Option<MetaTree>> {
        let len = self.meta.metadata().on(StoreFile::Meta)?.len();
        if len == 0 {
            return Ok(None);
        }
        if len != META_RECORD_SIZE as u64 {
            return Err(StoreError::corrupt(
                StoreFile::Meta,
                format!("expected {META_RECORD_SIZE} bytes, found {len}"),
            ));
        }
        let mut f = &self.meta;
        f.seek(SeekFrom::Start(0)).on(StoreFile::Meta)?;
        let mut buf = [0_u8; META_RECORD_SIZE];
        f.read_exact(&mut buf).on(StoreFile::Meta)?;
        MetaTree::decode(&buf).map(Some)
    }

    fn file(&self, which: StoreFile) -> &File {
        match which {
            StoreFile::Blob => &self.blob,
            StoreFile::Index => &self.index,
            StoreFile::Tree => &self.tree,
            StoreFile::Meta => &self.meta,
        }
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        for which in StoreFile::ALL {
            self.file(which).flush().on(which)?;
        }
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> Result<()> {
        self.flush()?;
        for which in StoreFile::ALL {
            self.file(which).sync_data().on(which)?;
        }
        Ok(())
    }
}

/// Sequential cursor over the tree-shape file.
#[derive(Debug)]
pub(crate) struct TreeReader<'a> {
    inner: BufReader<&'a File>,
}

impl TreeReader<'_> {
    /// Next record, or `None` at end of file.
    pub(crate) fn next_record(&mut self) -> Result<Option<TreeNodeRecord>> {
        let mut buf = [0_u8; TREE_NODE_RECORD_SIZE];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(Some(TreeNodeRecord::decode(&buf))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(StoreError::Io {
                file: StoreFile::Tree,
                source,
            }),
        }
    }
}

fn path_of(dir: &Path, name: &str, file: StoreFile) -> PathBuf {
    dir.join(format!("{name}.{}", file.suffix()))
}

/// Byte range `[start, end)` of the page-table entry for `id`.
fn index_slot(id: RecordId) -> Result<(u64, u64)> {
    let width = INDEX_RECORD_SIZE as u64;
    u64::try_from(id)
        .ok()
        .and_then(|id| id.checked_mul(width))
        .and_then(|start| Some((start, start.checked_add(width)?)))
        .ok_or(StoreError::UnknownId { id })
}
