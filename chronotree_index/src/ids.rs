// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Record id allocation.
//!
//! Tree nodes, leaves, and the payload records that leaves point at all draw
//! from one id space, because the store addresses every one of them through the
//! same id-indexed page table.

/// Persisted identifier of a node, leaf, or payload record.
pub type RecordId = i64;

/// Source of fresh, strictly increasing record ids.
///
/// Any `FnMut() -> RecordId` closure is an allocator, so callers can inject
/// their own numbering.
pub trait IdAllocator {
    /// Hand out the next id.
    fn next_id(&mut self) -> RecordId;
}

impl<F: FnMut() -> RecordId> IdAllocator for F {
    fn next_id(&mut self) -> RecordId {
        self()
    }
}

/// Monotonic counter; the first id handed out is `1`.
///
/// Id `0` is never allocated, so a zero-filled page-table slot can never be
/// mistaken for a real record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MonotonicIds {
    last: RecordId,
}

impl MonotonicIds {
    /// A fresh counter.
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Resume numbering after a previously persisted high-water mark.
    pub const fn starting_after(last_id: RecordId) -> Self {
        Self { last: last_id }
    }

    /// The most recently allocated id, or `0` if none.
    pub const fn last_id(&self) -> RecordId {
        self.last
    }
}

impl IdAllocator for MonotonicIds {
    fn next_id(&mut self) -> RecordId {
        self.last += 1;
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_strictly_increasing_from_one() {
        let mut ids = MonotonicIds::new();
        assert_eq!(ids.last_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.last_id(), 2);
    }

    #[test]
    fn resumes_after_high_water_mark() {
        let mut ids = MonotonicIds::starting_after(41);
        assert_eq!(ids.next_id(), 42);
    }

    #[test]
    fn closures_are_allocators() {
        let mut next = 100;
        let mut alloc = || {
            next += 10;
            next
        };
        assert_eq!(IdAllocator::next_id(&mut alloc), 110);
        assert_eq!(IdAllocator::next_id(&mut alloc), 120);
    }
}
