//! CursorList: pooled intrusive doubly linked list with a navigation cursor
//!
//! Nodes live in a [`BlockPool`] and link to each other by index. The head
//! node's `prev` always points at the tail, so both ends are reachable in
//! O(1) from a single head index. Interior `next` pointers are NIL-terminated
//! at the tail.
//!
//! Two pieces of cursor state ride along with the chain: a navigation cursor
//! (`move_first`/`move_next`/...) with BOF and EOF end states, and a cached
//! positional cursor that makes sequential [`get_at`](CursorList::get_at)
//! calls O(1). Structural edits rebase both so they stay coherent.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::error::Result;
use crate::memory::{BlockPool, NIL};
use crate::policy::{ComparePolicy, Policy, Value};

/// Intrusive chain pointers embedded in every pooled node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListLinks {
    pub(crate) prev: u32,
    pub(crate) next: u32,
}

impl Default for ListLinks {
    fn default() -> Self {
        Self {
            prev: NIL,
            next: NIL,
        }
    }
}

/// Node types that embed [`ListLinks`].
pub(crate) trait Linked {
    fn links(&self) -> &ListLinks;
    fn links_mut(&mut self) -> &mut ListLinks;
}

#[inline]
pub(crate) fn link_next<N: Linked>(pool: &BlockPool<N>, idx: u32) -> u32 {
    // SAFETY: chain indices always refer to live pool slots.
    unsafe { pool.get(idx) }.links().next
}

#[inline]
fn link_prev<N: Linked>(pool: &BlockPool<N>, idx: u32) -> u32 {
    // SAFETY: chain indices always refer to live pool slots.
    unsafe { pool.get(idx) }.links().prev
}

#[inline]
fn set_next<N: Linked>(pool: &mut BlockPool<N>, idx: u32, next: u32) {
    // SAFETY: chain indices always refer to live pool slots.
    unsafe { pool.get_mut(idx) }.links_mut().next = next;
}

#[inline]
fn set_prev<N: Linked>(pool: &mut BlockPool<N>, idx: u32, prev: u32) {
    // SAFETY: chain indices always refer to live pool slots.
    unsafe { pool.get_mut(idx) }.links_mut().prev = prev;
}

/// Chain and cursor bookkeeping over nodes held in a caller-supplied pool.
///
/// The node pool is passed into every operation rather than owned, so a
/// containing type can interleave chain edits with its own per-node state.
pub(crate) struct RawList {
    first: u32,
    len: usize,
    current: u32,
    last_forward: bool,
    iter_node: Cell<u32>,
    iter_pos: Cell<usize>,
}

impl RawList {
    pub(crate) fn new() -> Self {
        Self {
            first: NIL,
            len: 0,
            current: NIL,
            last_forward: true,
            iter_node: Cell::new(NIL),
            iter_pos: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn first(&self) -> u32 {
        self.first
    }

    #[inline]
    pub(crate) fn current(&self) -> u32 {
        self.current
    }

    #[inline]
    pub(crate) fn last_forward(&self) -> bool {
        self.last_forward
    }

    /// Tail of the chain, reached through the head's `prev` alias.
    #[inline]
    pub(crate) fn last<N: Linked>(&self, pool: &BlockPool<N>) -> u32 {
        if self.first == NIL {
            NIL
        } else {
            link_prev(pool, self.first)
        }
    }

    /// Predecessor in iteration order: NIL at the head, despite the head's
    /// raw `prev` pointing at the tail.
    #[inline]
    fn prev_of<N: Linked>(&self, pool: &BlockPool<N>, idx: u32) -> u32 {
        if idx == self.first {
            NIL
        } else {
            link_prev(pool, idx)
        }
    }

    /// Append `idx` at the tail. Cursors are unaffected.
    pub(crate) fn push_back<N: Linked>(&mut self, pool: &mut BlockPool<N>, idx: u32) {
        if self.first != NIL {
            let tail = link_prev(pool, self.first);
            set_next(pool, tail, idx);
            set_prev(pool, idx, tail);
            set_next(pool, idx, NIL);
            set_prev(pool, self.first, idx);
        } else {
            self.first = idx;
            set_prev(pool, idx, idx);
            set_next(pool, idx, NIL);
        }
        self.len += 1;
    }

    /// Insert `idx` at the head and slide the positional cache back one node
    /// so its position number keeps addressing the same rank.
    pub(crate) fn push_front<N: Linked>(&mut self, pool: &mut BlockPool<N>, idx: u32) {
        if self.first != NIL {
            set_prev(pool, idx, link_prev(pool, self.first));
            set_prev(pool, self.first, idx);
        } else {
            set_prev(pool, idx, idx);
        }
        set_next(pool, idx, self.first);
        self.first = idx;

        if self.iter_node.get() != NIL {
            self.iter_node.set(self.prev_of(pool, self.iter_node.get()));
        }
        self.len += 1;
    }

    /// Splice `idx` in front of `before`. NIL appends at the tail.
    pub(crate) fn insert_before<N: Linked>(
        &mut self,
        pool: &mut BlockPool<N>,
        idx: u32,
        before: u32,
    ) {
        if before == NIL {
            self.push_back(pool, idx);
            return;
        }
        if before == self.first {
            self.push_front(pool, idx);
            return;
        }

        let before_cache = self.is_before_cached(pool, before);

        let before_prev = link_prev(pool, before);
        set_next(pool, idx, before);
        set_prev(pool, idx, before_prev);
        set_prev(pool, before, idx);
        set_next(pool, before_prev, idx);
        self.len += 1;

        if before_cache {
            self.iter_node.set(self.prev_of(pool, self.iter_node.get()));
        }
    }

    /// Is `idx` at or before the cached positional cursor? Scans whichever
    /// side of the cache is shorter.
    fn is_before_cached<N: Linked>(&self, pool: &BlockPool<N>, idx: u32) -> bool {
        let iter = self.iter_node.get();
        if iter == NIL {
            return false;
        }
        if idx == iter {
            return true;
        }

        if self.iter_pos.get() < self.len / 2 {
            let mut scan = iter;
            while scan != NIL {
                if scan == idx {
                    return true;
                }
                scan = self.prev_of(pool, scan);
            }
            false
        } else {
            let mut scan = iter;
            while scan != NIL {
                if scan == idx {
                    return false;
                }
                scan = link_next(pool, scan);
            }
            true
        }
    }

    /// Unlink `idx`, rebasing both cursors. The caller frees the node.
    pub(crate) fn remove<N: Linked>(&mut self, pool: &mut BlockPool<N>, idx: u32) {
        debug_assert!(self.len > 0);

        // Positional cache: removal at or before it shifts its rank's node
        // to the cached node's successor.
        if self.is_before_cached(pool, idx) {
            if self.iter_pos.get() == self.len - 2 {
                // The successor would be the tail, which get_at reaches in
                // O(1) anyway.
                self.iter_node.set(NIL);
            } else {
                self.iter_node.set(link_next(pool, self.iter_node.get()));
            }
        }

        // Navigation cursor: step off the removed node so the next move in
        // the same direction lands on its neighbor.
        if idx == self.current {
            if self.last_forward {
                self.current = if self.current == self.first {
                    NIL
                } else {
                    link_prev(pool, self.current)
                };
            } else {
                self.current = link_next(pool, self.current);
            }
        }

        if self.first == idx {
            if link_prev(pool, self.first) == self.first {
                self.first = NIL;
            } else {
                let tail = link_prev(pool, self.first);
                let new_first = link_next(pool, self.first);
                set_prev(pool, new_first, tail);
                self.first = new_first;
            }
        } else if link_prev(pool, self.first) == idx {
            let before = link_prev(pool, idx);
            set_next(pool, before, NIL);
            set_prev(pool, self.first, before);
        } else {
            let prev = link_prev(pool, idx);
            let next = link_next(pool, idx);
            set_next(pool, prev, next);
            set_prev(pool, next, prev);
        }

        self.len -= 1;
    }

    /// Forget the chain without touching nodes. The caller has freed them.
    pub(crate) fn reset(&mut self) {
        self.first = NIL;
        self.len = 0;
        self.current = NIL;
        self.iter_node.set(NIL);
        self.iter_pos.set(0);
    }

    pub(crate) fn move_first(&mut self) {
        self.current = self.first;
        self.last_forward = true;
    }

    pub(crate) fn move_last<N: Linked>(&mut self, pool: &BlockPool<N>) {
        self.current = self.last(pool);
        self.last_forward = false;
    }

    pub(crate) fn move_next<N: Linked>(&mut self, pool: &BlockPool<N>) {
        if self.current != NIL {
            self.current = link_next(pool, self.current);
        } else if self.last_forward {
            self.current = self.first;
        }
        self.last_forward = true;
    }

    pub(crate) fn move_previous<N: Linked>(&mut self, pool: &BlockPool<N>) {
        if self.current != NIL {
            self.current = if self.current == self.first {
                NIL
            } else {
                link_prev(pool, self.current)
            };
        } else if !self.last_forward {
            self.current = self.last(pool);
        }
        self.last_forward = false;
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.first == NIL || (self.current == NIL && self.last_forward)
    }

    #[inline]
    pub(crate) fn is_bof(&self) -> bool {
        self.first == NIL || (self.current == NIL && !self.last_forward)
    }

    /// Node at position `pos`, walking the cheapest of head, tail, or the
    /// cached cursor. Positions next to either end bypass the cache.
    pub(crate) fn get_at<N: Linked>(&self, pool: &BlockPool<N>, pos: usize) -> u32 {
        assert!(
            pos < self.len,
            "position {} out of range for length {}",
            pos,
            self.len
        );

        if pos == 0 {
            self.iter_node.set(NIL);
            return self.first;
        }
        if pos == 1 {
            let second = link_next(pool, self.first);
            self.iter_node.set(second);
            self.iter_pos.set(1);
            return second;
        }
        if pos == self.len - 1 {
            self.iter_node.set(NIL);
            return self.last(pool);
        }
        if pos == self.len - 2 {
            let node = link_prev(pool, self.last(pool));
            self.iter_node.set(node);
            self.iter_pos.set(pos);
            return node;
        }

        if self.iter_node.get() != NIL {
            let cached = self.iter_pos.get();
            if pos == cached {
                return self.iter_node.get();
            }
            if pos == cached + 1 {
                let node = link_next(pool, self.iter_node.get());
                self.iter_node.set(node);
                self.iter_pos.set(pos);
                return node;
            }
            if pos + 1 == cached {
                let node = link_prev(pool, self.iter_node.get());
                self.iter_node.set(node);
                self.iter_pos.set(pos);
                return node;
            }
        }

        let from_start = pos;
        let from_end = self.len - 1 - pos;
        if self.iter_node.get() != NIL {
            let cached = self.iter_pos.get();
            let from_cache = if cached > pos { cached - pos } else { pos - cached };
            if from_cache < from_start && from_cache < from_end {
                let mut node = self.iter_node.get();
                let mut at = cached;
                while at < pos {
                    node = link_next(pool, node);
                    at += 1;
                }
                while at > pos {
                    node = link_prev(pool, node);
                    at -= 1;
                }
                self.iter_node.set(node);
                self.iter_pos.set(pos);
                return node;
            }
        }

        let node = if from_start < from_end {
            let mut node = self.first;
            for _ in 0..from_start {
                node = link_next(pool, node);
            }
            node
        } else {
            let mut node = self.last(pool);
            for _ in 0..from_end {
                node = link_prev(pool, node);
            }
            node
        };
        self.iter_node.set(node);
        self.iter_pos.set(pos);
        node
    }
}

/// A value plus its chain pointers.
struct ListNode<T> {
    value: T,
    links: ListLinks,
}

impl<T> Linked for ListNode<T> {
    #[inline]
    fn links(&self) -> &ListLinks {
        &self.links
    }

    #[inline]
    fn links_mut(&mut self) -> &mut ListLinks {
        &mut self.links
    }
}

/// Pooled doubly linked list with a navigation cursor and O(1) sequential
/// positional access.
///
/// # Examples
///
/// ```rust
/// use plinth::CursorList;
///
/// let mut list: CursorList<i32> = CursorList::new();
/// list.push_back(1)?;
/// list.push_back(2)?;
/// list.push_front(0)?;
///
/// list.move_first();
/// assert_eq!(list.current(), Some(&0));
/// list.move_next();
/// assert_eq!(list.current(), Some(&1));
/// # Ok::<(), plinth::PlinthError>(())
/// ```
pub struct CursorList<T, P: Policy<T> = Value> {
    pool: BlockPool<ListNode<T>>,
    raw: RawList,
    _policy: PhantomData<P>,
}

impl<T, P: Policy<T>> CursorList<T, P> {
    /// Create a new empty list.
    pub fn new() -> Self {
        Self {
            pool: BlockPool::new(),
            raw: RawList::new(),
            _policy: PhantomData,
        }
    }

    /// Create a list whose node pool uses `block_size` slots per block.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            pool: BlockPool::with_block_size(block_size),
            raw: RawList::new(),
            _policy: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Check if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Append an element at the tail.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        let idx = self.pool.alloc(ListNode {
            value: P::on_add(value),
            links: ListLinks::default(),
        })?;
        self.raw.push_back(&mut self.pool, idx);
        Ok(())
    }

    /// Insert an element at the head.
    pub fn push_front(&mut self, value: T) -> Result<()> {
        let idx = self.pool.alloc(ListNode {
            value: P::on_add(value),
            links: ListLinks::default(),
        })?;
        self.raw.push_front(&mut self.pool, idx);
        Ok(())
    }

    /// Insert an element in front of the cursor.
    ///
    /// With the cursor on a node the new element lands just before it. At
    /// EOF this appends; at BOF it prepends. The cursor stays on its node.
    pub fn insert_before_current(&mut self, value: T) -> Result<()> {
        let target = self.raw.current();
        let idx = self.pool.alloc(ListNode {
            value: P::on_add(value),
            links: ListLinks::default(),
        })?;
        if target != NIL {
            self.raw.insert_before(&mut self.pool, idx, target);
        } else if self.raw.last_forward() {
            self.raw.push_back(&mut self.pool, idx);
        } else {
            self.raw.push_front(&mut self.pool, idx);
        }
        Ok(())
    }

    /// Remove the element under the cursor, destroying it.
    ///
    /// The cursor steps off the node against its travel direction, so the
    /// next move in that direction lands on the removed node's neighbor.
    /// Returns false when the cursor is at BOF or EOF.
    pub fn remove_current(&mut self) -> bool {
        let idx = self.raw.current();
        if idx == NIL {
            return false;
        }
        self.raw.remove(&mut self.pool, idx);
        // SAFETY: idx was a live node of this list.
        let node = unsafe { self.pool.free(idx) };
        P::on_remove(node.value);
        true
    }

    /// Detach the element under the cursor and hand it back.
    pub fn detach_current(&mut self) -> Option<T> {
        let idx = self.raw.current();
        if idx == NIL {
            return None;
        }
        self.raw.remove(&mut self.pool, idx);
        // SAFETY: idx was a live node of this list.
        let node = unsafe { self.pool.free(idx) };
        Some(P::on_detach(node.value))
    }

    /// Remove the element at `pos`, destroying it.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn remove_at(&mut self, pos: usize) {
        let idx = self.raw.get_at(&self.pool, pos);
        self.raw.remove(&mut self.pool, idx);
        // SAFETY: idx was a live node of this list.
        let node = unsafe { self.pool.free(idx) };
        P::on_remove(node.value);
    }

    /// Detach the element at `pos` and hand it back.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn detach_at(&mut self, pos: usize) -> T {
        let idx = self.raw.get_at(&self.pool, pos);
        self.raw.remove(&mut self.pool, idx);
        // SAFETY: idx was a live node of this list.
        let node = unsafe { self.pool.free(idx) };
        P::on_detach(node.value)
    }

    /// Borrow the element at `pos`.
    ///
    /// Sequential positions reuse the cached cursor and cost O(1).
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn get_at(&self, pos: usize) -> &T {
        let idx = self.raw.get_at(&self.pool, pos);
        // SAFETY: get_at returns a live node.
        &unsafe { self.pool.get(idx) }.value
    }

    /// Mutably borrow the element at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn get_at_mut(&mut self, pos: usize) -> &mut T {
        let idx = self.raw.get_at(&self.pool, pos);
        // SAFETY: get_at returns a live node.
        &mut unsafe { self.pool.get_mut(idx) }.value
    }

    /// Borrow the first element.
    pub fn front(&self) -> Option<&T> {
        let idx = self.raw.first();
        if idx == NIL {
            None
        } else {
            // SAFETY: the head is a live node.
            Some(&unsafe { self.pool.get(idx) }.value)
        }
    }

    /// Borrow the last element.
    pub fn back(&self) -> Option<&T> {
        let idx = self.raw.last(&self.pool);
        if idx == NIL {
            None
        } else {
            // SAFETY: the tail is a live node.
            Some(&unsafe { self.pool.get(idx) }.value)
        }
    }

    /// Detach and return the first element.
    pub fn pop_front(&mut self) -> Option<T> {
        let idx = self.raw.first();
        if idx == NIL {
            return None;
        }
        self.raw.remove(&mut self.pool, idx);
        // SAFETY: idx was the live head.
        let node = unsafe { self.pool.free(idx) };
        Some(P::on_detach(node.value))
    }

    /// Detach and return the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        let idx = self.raw.last(&self.pool);
        if idx == NIL {
            return None;
        }
        self.raw.remove(&mut self.pool, idx);
        // SAFETY: idx was the live tail.
        let node = unsafe { self.pool.free(idx) };
        Some(P::on_detach(node.value))
    }

    /// Park the cursor on the first element.
    pub fn move_first(&mut self) {
        self.raw.move_first();
    }

    /// Park the cursor on the last element.
    pub fn move_last(&mut self) {
        self.raw.move_last(&self.pool);
    }

    /// Step the cursor forward. From EOF this restarts at the head.
    pub fn move_next(&mut self) {
        self.raw.move_next(&self.pool);
    }

    /// Step the cursor backward. From BOF this restarts at the tail.
    pub fn move_previous(&mut self) {
        self.raw.move_previous(&self.pool);
    }

    /// Borrow the element under the cursor, if it is on one.
    pub fn current(&self) -> Option<&T> {
        let idx = self.raw.current();
        if idx == NIL {
            None
        } else {
            // SAFETY: the cursor only rests on live nodes.
            Some(&unsafe { self.pool.get(idx) }.value)
        }
    }

    /// Mutably borrow the element under the cursor.
    pub fn current_mut(&mut self) -> Option<&mut T> {
        let idx = self.raw.current();
        if idx == NIL {
            None
        } else {
            // SAFETY: the cursor only rests on live nodes.
            Some(&mut unsafe { self.pool.get_mut(idx) }.value)
        }
    }

    /// True when the cursor sits past the tail (or the list is empty).
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.raw.is_eof()
    }

    /// True when the cursor sits before the head (or the list is empty).
    #[inline]
    pub fn is_bof(&self) -> bool {
        self.raw.is_bof()
    }

    /// Remove every element, destroying them head to tail.
    pub fn clear(&mut self) {
        let mut idx = self.raw.first();
        while idx != NIL {
            let next = link_next(&self.pool, idx);
            // SAFETY: idx is a live node of this list.
            let node = unsafe { self.pool.free(idx) };
            P::on_remove(node.value);
            idx = next;
        }
        self.raw.reset();
    }

    /// Iterate the elements head to tail.
    pub fn iter(&self) -> Iter<'_, T, P> {
        Iter {
            list: self,
            node: self.raw.first(),
        }
    }
}

impl<T, P: ComparePolicy<T>> CursorList<T, P> {
    /// Check whether an element comparing equal to `value` is present.
    pub fn contains(&self, value: &T) -> bool {
        self.iter()
            .any(|item| P::compare(item, value) == Ordering::Equal)
    }

    /// Position of the first element comparing equal to `value`.
    pub fn find(&self, value: &T) -> Option<usize> {
        self.iter()
            .position(|item| P::compare(item, value) == Ordering::Equal)
    }
}

impl<T, P: Policy<T>> Default for CursorList<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: Policy<T>> Drop for CursorList<T, P> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug, P: Policy<T>> fmt::Debug for CursorList<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, P: Policy<T>> PartialEq for CursorList<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Eq, P: Policy<T>> Eq for CursorList<T, P> {}

impl<T: Clone, P: Policy<T>> Clone for CursorList<T, P> {
    fn clone(&self) -> Self {
        let mut list = Self::with_block_size(self.pool.block_size());
        for value in self.iter() {
            list.push_back(value.clone()).unwrap();
        }
        list
    }
}

/// Head-to-tail iterator over a [`CursorList`].
pub struct Iter<'a, T, P: Policy<T>> {
    list: &'a CursorList<T, P>,
    node: u32,
}

impl<'a, T, P: Policy<T>> Iterator for Iter<'a, T, P> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.node == NIL {
            return None;
        }
        // SAFETY: the iterator only walks live nodes.
        let node = unsafe { self.list.pool.get(self.node) };
        self.node = node.links.next;
        Some(&node.value)
    }
}
