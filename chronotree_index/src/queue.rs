// Copyright 2025 the Chronotree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-backed doubly linked list and the FIFO queue built on it.
//!
//! Breadth-first traversal during serialization and restoration needs a queue
//! of unknown, unbounded length. Links are slot indices into a single arena, so
//! there is no ownership cycle between `next` and `prev`.

use alloc::vec::Vec;

/// Generational handle to an element of a [`LinkedList`].
///
/// Becomes stale once the element is removed; stale keys are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListKey(u32, u32);

impl ListKey {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "List keys are intentionally 32-bit."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct Link<T> {
    generation: u32,
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list with O(1) push/pop at both ends and O(1) removal by key.
#[derive(Clone, Debug)]
pub struct LinkedList<T> {
    links: Vec<Link<T>>,
    free_list: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkedList<T> {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            links: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `value` at the back.
    pub fn push_back(&mut self, value: T) -> ListKey {
        let (idx, key) = self.alloc(value);
        self.links[idx].prev = self.tail;
        match self.tail {
            Some(tail) => self.links[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        key
    }

    /// Prepend `value` at the front.
    pub fn push_front(&mut self, value: T) -> ListKey {
        let (idx, key) = self.alloc(value);
        self.links[idx].next = self.head;
        match self.head {
            Some(head) => self.links[head].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        key
    }

    /// Remove and return the first element.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.unlink(head)
    }

    /// Remove and return the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.unlink(tail)
    }

    /// First element, if any.
    pub fn front(&self) -> Option<&T> {
        self.links[self.head?].value.as_ref()
    }

    /// Last element, if any.
    pub fn back(&self) -> Option<&T> {
        self.links[self.tail?].value.as_ref()
    }

    /// Look up a live element by key.
    pub fn get(&self, key: ListKey) -> Option<&T> {
        let link = self.links.get(key.idx())?;
        if link.generation != key.1 {
            return None;
        }
        link.value.as_ref()
    }

    /// Remove the element behind `key`. Returns `None` for stale keys.
    pub fn remove(&mut self, key: ListKey) -> Option<T> {
        let link = self.links.get(key.idx())?;
        if link.generation != key.1 || link.value.is_none() {
            return None;
        }
        self.unlink(key.idx())
    }

    /// Drop every element. Outstanding keys become stale.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let idx = cursor?;
            let link = &self.links[idx];
            cursor = link.next;
            link.value.as_ref()
        })
    }

    fn alloc(&mut self, value: T) -> (usize, ListKey) {
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            let link = &mut self.links[idx];
            link.generation = link.generation.wrapping_add(1);
            link.value = Some(value);
            link.prev = None;
            link.next = None;
            (idx, ListKey::new(idx, link.generation))
        } else {
            let generation = 1_u32;
            self.links.push(Link {
                generation,
                value: Some(value),
                prev: None,
                next: None,
            });
            let idx = self.links.len() - 1;
            (idx, ListKey::new(idx, generation))
        }
    }

    fn unlink(&mut self, idx: usize) -> Option<T> {
        let (prev, next) = {
            let link = &mut self.links[idx];
            (link.prev.take(), link.next.take())
        };
        match prev {
            Some(p) => self.links[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n].prev = prev,
            None => self.tail = prev,
        }
        let value = self.links[idx].value.take();
        if value.is_some() {
            self.len -= 1;
            self.free_list.push(idx);
        }
        value
    }
}

/// Unbounded FIFO queue.
#[derive(Clone, Debug)]
pub struct Queue<T> {
    list: LinkedList<T>,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            list: LinkedList::new(),
        }
    }

    /// Enqueue at the back.
    pub fn push(&mut self, value: T) {
        self.list.push_back(value);
    }

    /// Dequeue from the front.
    pub fn pop(&mut self) -> Option<T> {
        self.list.pop_front()
    }

    /// The element that `pop` would return next.
    pub fn peek(&self) -> Option<&T> {
        self.list.front()
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop everything queued.
    pub fn clear(&mut self) {
        self.list.clear();
    }
}

impl<T> Extend<T> for Queue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}
