// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use chronotree_index::RecordId;

/// The four files that make up a named store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreFile {
    /// Append-only payload blobs.
    Blob,
    /// Fixed-width id → location page table.
    Index,
    /// Breadth-first tree shape.
    Tree,
    /// Bounds and id high-water mark.
    Meta,
}

impl StoreFile {
    /// All files, in the order they are opened.
    pub const ALL: [Self; 4] = [Self::Blob, Self::Index, Self::Tree, Self::Meta];

    /// File name suffix used on disk.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Index => "idx",
            Self::Tree => "tree",
            Self::Meta => "meta",
        }
    }
}

impl fmt::Display for StoreFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Errors from [`MappedTree`](crate::MappedTree).
///
/// Three families matter to callers: I/O failures (worth retrying, see
/// [`StoreError::is_retryable`]), corruption (the files disagree with each
/// other or with the format, see [`StoreError::is_corruption`]), and misuse
/// such as oversized payloads or writing back a partial tree.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The operating system reported an error.
    #[error("I/O error on the {file} file")]
    Io {
        /// File being accessed.
        file: StoreFile,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The store directory could not be created.
    #[error("cannot create store directory {}", path.display())]
    CreateDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A read reached past the end of a file.
    #[error("reading {len} bytes at offset {offset} runs past the end of the {file} file")]
    OutOfRange {
        /// File being read.
        file: StoreFile,
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
    },
    /// A fixed-width record or the file layout is inconsistent.
    #[error("corrupt {file} file: {reason}")]
    Corrupt {
        /// File holding the bad data.
        file: StoreFile,
        /// What was wrong.
        reason: String,
    },
    /// A variable-length blob record failed to decode.
    #[error("undecodable record in the {file} file")]
    Decode {
        /// File holding the bad data.
        file: StoreFile,
        /// Decoder error.
        #[source]
        source: bitcode::Error,
    },
    /// The page table has no record for this id.
    #[error("no record with id {id}")]
    UnknownId {
        /// The id looked up.
        id: RecordId,
    },
    /// A payload id too large to have been handed out as a record id.
    #[error("no payload with id {leaf_data}")]
    UnknownPayload {
        /// The id looked up.
        leaf_data: u64,
    },
    /// A record is larger than an index entry can describe.
    #[error("record of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Length of the rejected record.
        len: usize,
        /// Largest storable record.
        max: usize,
    },
    /// The tree was only partially restored and would overwrite data it never loaded.
    #[error("refusing to serialize a partially restored tree")]
    PartialTree,
}

impl StoreError {
    /// True for storage I/O failures, which may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::CreateDir { .. })
    }

    /// True when the files themselves are damaged or inconsistent.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::Decode { .. } | Self::UnknownId { .. } | Self::OutOfRange { .. }
        )
    }

    pub(crate) fn corrupt(file: StoreFile, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            file,
            reason: reason.into(),
        }
    }
}

/// Attach the file to an [`io::Error`].
pub(crate) trait IoContext<T> {
    fn on(self, file: StoreFile) -> Result<T, StoreError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn on(self, file: StoreFile) -> Result<T, StoreError> {
        self.map_err(|source| StoreError::Io { file, source })
    }
}

/// Result alias used throughout the store.
pub type Result<T, E = StoreError> = core::result::Result<T, E>;
