//! GrowVec: policy-aware dynamic array using realloc for growth
//!
//! The workhorse sequence container. Growth reallocates to twice the
//! required size (minimum 16 slots), so repeated pushes amortize to O(1)
//! while realloc can often extend in place. Every element entering or
//! leaving the vector passes through the ownership policy hooks.

use std::alloc::{self, Layout};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::ptr::{self, NonNull};
use std::slice;

use crate::error::{PlinthError, Result};
use crate::policy::{ComparePolicy, Policy, Value};

/// Policy-aware dynamic array.
///
/// Indices are positional contracts: passing an out of range index is a
/// programming error and panics. Allocation is the only recoverable failure
/// and surfaces as [`PlinthError::OutOfMemory`].
///
/// # Examples
///
/// ```rust
/// use plinth::GrowVec;
///
/// let mut vec: GrowVec<i32> = GrowVec::new();
/// vec.push(42)?;
/// vec.push(84)?;
/// assert_eq!(vec.len(), 2);
/// assert_eq!(vec[0], 42);
/// # Ok::<(), plinth::PlinthError>(())
/// ```
pub struct GrowVec<T, P: Policy<T> = Value> {
    ptr: Option<NonNull<T>>,
    len: usize,
    cap: usize,
    _policy: PhantomData<P>,
}

impl<T, P: Policy<T>> GrowVec<T, P> {
    /// Create a new empty vector.
    #[inline]
    pub fn new() -> Self {
        Self {
            ptr: None,
            len: 0,
            cap: 0,
            _policy: PhantomData,
        }
    }

    /// Create a vector with exactly the specified capacity.
    pub fn with_capacity(cap: usize) -> Result<Self> {
        if cap == 0 {
            return Ok(Self::new());
        }

        let layout = Layout::array::<T>(cap)
            .map_err(|_| PlinthError::out_of_memory(cap.saturating_mul(mem::size_of::<T>())))?;

        let ptr = unsafe { alloc::alloc(layout) as *mut T };
        if ptr.is_null() {
            return Err(PlinthError::out_of_memory(layout.size()));
        }

        Ok(Self {
            ptr: Some(unsafe { NonNull::new_unchecked(ptr) }),
            len: 0,
            cap,
            _policy: PhantomData,
        })
    }

    /// Number of elements in the vector.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the vector can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Get a pointer to the underlying data.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => ptr::null(),
        }
    }

    /// Get a mutable pointer to the underlying data.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    /// Get the vector as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
        }
    }

    /// Get the vector as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.len == 0 {
            &mut []
        } else {
            unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
        }
    }

    /// Ensure capacity for at least `required` elements.
    ///
    /// Grows to twice the required size, never below 16 slots.
    pub fn grow_to(&mut self, required: usize) -> Result<()> {
        if required <= self.cap {
            return Ok(());
        }

        let mut target = required.saturating_mul(2);
        if target < 16 {
            target = 16;
        }

        let new_layout = Layout::array::<T>(target).map_err(|_| {
            PlinthError::out_of_memory(target.saturating_mul(mem::size_of::<T>()))
        })?;

        let new_ptr = match self.ptr {
            Some(ptr) => {
                let old_layout = Layout::array::<T>(self.cap).unwrap();
                unsafe {
                    alloc::realloc(ptr.as_ptr() as *mut u8, old_layout, new_layout.size())
                        as *mut T
                }
            }
            None => unsafe { alloc::alloc(new_layout) as *mut T },
        };

        if new_ptr.is_null() {
            return Err(PlinthError::out_of_memory(new_layout.size()));
        }

        self.ptr = Some(unsafe { NonNull::new_unchecked(new_ptr) });
        self.cap = target;
        Ok(())
    }

    /// Append an element and return its index.
    pub fn push(&mut self, value: T) -> Result<usize> {
        self.grow_to(self.len + 1)?;
        unsafe {
            ptr::write(self.as_mut_ptr().add(self.len), P::on_add(value));
        }
        self.len += 1;
        Ok(self.len - 1)
    }

    /// Insert an element at `pos`, shifting everything after it.
    ///
    /// # Panics
    ///
    /// Panics if `pos > len`.
    pub fn insert_at(&mut self, pos: usize, value: T) -> Result<()> {
        assert!(
            pos <= self.len,
            "insert position {} out of range for length {}",
            pos,
            self.len
        );
        self.grow_to(self.len + 1)?;
        unsafe {
            let p = self.as_mut_ptr().add(pos);
            ptr::copy(p, p.add(1), self.len - pos);
            ptr::write(p, P::on_add(value));
        }
        self.len += 1;
        Ok(())
    }

    /// Insert a slice of elements at `pos` with a single shift.
    ///
    /// # Panics
    ///
    /// Panics if `pos > len`.
    pub fn insert_slice_at(&mut self, pos: usize, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        assert!(
            pos <= self.len,
            "insert position {} out of range for length {}",
            pos,
            self.len
        );
        if values.is_empty() {
            return Ok(());
        }
        self.grow_to(self.len + values.len())?;
        let tail = self.len - pos;
        unsafe {
            let p = self.as_mut_ptr().add(pos);
            ptr::copy(p, p.add(values.len()), tail);
            self.len = pos;
            for value in values {
                ptr::write(self.as_mut_ptr().add(self.len), P::on_add(value.clone()));
                self.len += 1;
            }
        }
        self.len += tail;
        Ok(())
    }

    /// Append a slice of elements.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        self.insert_slice_at(self.len, values)
    }

    /// Remove the element at `pos`, running the removal hook.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn remove_at(&mut self, pos: usize) {
        self.remove_range(pos, 1);
    }

    /// Remove `count` elements starting at `pos` with a single shift.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the vector.
    pub fn remove_range(&mut self, pos: usize, count: usize) {
        assert!(
            pos <= self.len && count <= self.len - pos,
            "remove range {}..{} out of range for length {}",
            pos,
            pos + count,
            self.len
        );
        if count == 0 {
            return;
        }
        let tail = self.len - pos - count;
        self.len = pos;
        unsafe {
            let p = self.as_mut_ptr().add(pos);
            for i in 0..count {
                P::on_remove(ptr::read(p.add(i)));
            }
            ptr::copy(p.add(count), p, tail);
        }
        self.len = pos + tail;
    }

    /// Take the element at `pos` out of the vector, running the detach hook.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn detach_at(&mut self, pos: usize) -> T {
        assert!(
            pos < self.len,
            "index {} out of range for length {}",
            pos,
            self.len
        );
        unsafe {
            let p = self.as_mut_ptr().add(pos);
            let value = ptr::read(p);
            ptr::copy(p.add(1), p, self.len - pos - 1);
            self.len -= 1;
            P::on_detach(value)
        }
    }

    /// Detach every element, front to back, and return them.
    pub fn detach_all(&mut self) -> Vec<T> {
        let len = self.len;
        let mut out = Vec::with_capacity(len);
        self.len = 0;
        unsafe {
            for i in 0..len {
                out.push(P::on_detach(ptr::read(self.as_ptr().add(i))));
            }
        }
        out
    }

    /// Replace the element at `pos`: removal hook on the old value, add hook
    /// on the new one.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn replace_at(&mut self, pos: usize, value: T) {
        assert!(
            pos < self.len,
            "index {} out of range for length {}",
            pos,
            self.len
        );
        unsafe {
            let p = self.as_mut_ptr().add(pos);
            P::on_remove(ptr::read(p));
            ptr::write(p, P::on_add(value));
        }
    }

    /// Swap two elements in place. No policy hooks run.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn swap_items(&mut self, a: usize, b: usize) {
        self.as_mut_slice().swap(a, b);
    }

    /// Move the element at `from` to position `to`, shifting the elements
    /// between them. No policy hooks run.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) {
        assert!(
            from < self.len && to < self.len,
            "move {} -> {} out of range for length {}",
            from,
            to,
            self.len
        );
        if from == to {
            return;
        }
        unsafe {
            let p = self.as_mut_ptr();
            let value = ptr::read(p.add(from));
            if from < to {
                ptr::copy(p.add(from + 1), p.add(from), to - from);
            } else {
                ptr::copy(p.add(to), p.add(to + 1), from - to);
            }
            ptr::write(p.add(to), value);
        }
    }

    /// Exchange the entire contents with `other` in O(1). Buffers change
    /// owners wholesale, so no policy hooks run.
    pub fn swap_with(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.len, &mut other.len);
        mem::swap(&mut self.cap, &mut other.cap);
    }

    /// Resize to `new_len`, padding with clones of `pad` or detaching and
    /// dropping from the back.
    pub fn set_size(&mut self, new_len: usize, pad: &T) -> Result<()>
    where
        T: Clone,
    {
        if new_len > self.len {
            self.grow_to(new_len)?;
            while self.len < new_len {
                unsafe {
                    ptr::write(self.as_mut_ptr().add(self.len), P::on_add(pad.clone()));
                }
                self.len += 1;
            }
        } else {
            while self.len > new_len {
                let _ = self.detach_at(self.len - 1);
            }
        }
        Ok(())
    }

    /// Release unused capacity; frees the buffer entirely when empty.
    pub fn free_extra(&mut self) -> Result<()> {
        if self.len == self.cap {
            return Ok(());
        }

        if self.len == 0 {
            if let Some(ptr) = self.ptr {
                unsafe {
                    let layout = Layout::array::<T>(self.cap).unwrap();
                    alloc::dealloc(ptr.as_ptr() as *mut u8, layout);
                }
            }
            self.ptr = None;
            self.cap = 0;
            return Ok(());
        }

        let new_layout = Layout::array::<T>(self.len).map_err(|_| {
            PlinthError::out_of_memory(self.len.saturating_mul(mem::size_of::<T>()))
        })?;

        let new_ptr = match self.ptr {
            Some(ptr) => {
                let old_layout = Layout::array::<T>(self.cap).unwrap();
                unsafe {
                    alloc::realloc(ptr.as_ptr() as *mut u8, old_layout, new_layout.size())
                        as *mut T
                }
            }
            None => return Ok(()),
        };

        if new_ptr.is_null() {
            return Err(PlinthError::out_of_memory(new_layout.size()));
        }

        self.ptr = Some(unsafe { NonNull::new_unchecked(new_ptr) });
        self.cap = self.len;
        Ok(())
    }

    /// Remove every element, running removal hooks. Capacity is kept.
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        unsafe {
            for i in 0..len {
                P::on_remove(ptr::read(self.as_ptr().add(i)));
            }
        }
    }

    /// Sort with an explicit comparator.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.as_mut_slice().sort_unstable_by(|a, b| compare(a, b));
    }

    /// Binary search with an explicit probe, falling back to a linear scan
    /// once the window shrinks to 8 elements or fewer.
    ///
    /// The vector must be sorted consistently with `probe`. Returns the
    /// matching index or the insertion point.
    pub fn binary_search_by<F>(&self, mut probe: F) -> std::result::Result<usize, usize>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut lo = 0;
        let mut hi = self.len;
        while hi - lo > 8 {
            let mid = lo + (hi - lo) / 2;
            match probe(&self.as_slice()[mid]) {
                Ordering::Less => lo = mid + 1,
                Ordering::Equal => return Ok(mid),
                Ordering::Greater => hi = mid,
            }
        }
        for i in lo..hi {
            match probe(&self.as_slice()[i]) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(i),
                Ordering::Greater => return Err(i),
            }
        }
        Err(hi)
    }

    /// Detach and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            Some(self.detach_at(self.len - 1))
        }
    }

    /// Borrow the last element.
    #[inline]
    pub fn top(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Append an element; the queue-style alias for [`push`](Self::push).
    pub fn enqueue(&mut self, value: T) -> Result<usize> {
        self.push(value)
    }

    /// Detach and return the first element.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            Some(self.detach_at(0))
        }
    }

    /// Borrow the first element.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.as_slice().first()
    }
}

impl<T, P: ComparePolicy<T>> GrowVec<T, P> {
    /// Linear scan for the first element comparing equal to `value`.
    pub fn find(&self, value: &T) -> Option<usize> {
        self.as_slice()
            .iter()
            .position(|item| P::compare(item, value) == Ordering::Equal)
    }

    /// Linear scan starting just past `after`, for resuming a search.
    pub fn find_after(&self, after: usize, value: &T) -> Option<usize> {
        let start = after.saturating_add(1);
        (start..self.len).find(|&i| P::compare(&self.as_slice()[i], value) == Ordering::Equal)
    }

    /// Remove the first element comparing equal to `value`.
    ///
    /// Returns the index it held, or `None` if absent.
    pub fn remove(&mut self, value: &T) -> Option<usize> {
        let pos = self.find(value)?;
        self.remove_at(pos);
        Some(pos)
    }

    /// Detach the first element comparing equal to `value`.
    pub fn detach(&mut self, value: &T) -> Option<T> {
        let pos = self.find(value)?;
        Some(self.detach_at(pos))
    }

    /// Sort by the policy's ordering.
    pub fn sort(&mut self) {
        self.as_mut_slice().sort_unstable_by(|a, b| P::compare(a, b));
    }

    /// Binary search by the policy's ordering; the vector must be sorted.
    ///
    /// Returns the matching index or the insertion point.
    pub fn binary_search(&self, value: &T) -> std::result::Result<usize, usize> {
        self.binary_search_by(|probe| P::compare(probe, value))
    }
}

impl<T, P: Policy<T>> Default for GrowVec<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: Policy<T>> Drop for GrowVec<T, P> {
    fn drop(&mut self) {
        self.clear();
        if let Some(ptr) = self.ptr {
            if self.cap > 0 {
                unsafe {
                    let layout = Layout::array::<T>(self.cap).unwrap();
                    alloc::dealloc(ptr.as_ptr() as *mut u8, layout);
                }
            }
        }
    }
}

impl<T, P: Policy<T>> Deref for GrowVec<T, P> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T, P: Policy<T>> DerefMut for GrowVec<T, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T, P: Policy<T>> Index<usize> for GrowVec<T, P> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl<T, P: Policy<T>> IndexMut<usize> for GrowVec<T, P> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.as_mut_slice()[index]
    }
}

impl<'a, T, P: Policy<T>> IntoIterator for &'a GrowVec<T, P> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, P: Policy<T>> IntoIterator for &'a mut GrowVec<T, P> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: fmt::Debug, P: Policy<T>> fmt::Debug for GrowVec<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq, P: Policy<T>> PartialEq for GrowVec<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, P: Policy<T>> Eq for GrowVec<T, P> {}

impl<T: Clone, P: Policy<T>> Clone for GrowVec<T, P> {
    fn clone(&self) -> Self {
        let mut new_vec = Self::with_capacity(self.len).unwrap();
        for item in self.as_slice() {
            new_vec.push(item.clone()).unwrap();
        }
        new_vec
    }
}

// Safety: GrowVec<T> is Send/Sync if T is; the policy markers hold no state.
unsafe impl<T: Send, P: Policy<T>> Send for GrowVec<T, P> {}
unsafe impl<T: Sync, P: Policy<T>> Sync for GrowVec<T, P> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static ADD_CALLS: Cell<usize> = Cell::new(0);
        static REMOVE_CALLS: Cell<usize> = Cell::new(0);
        static DETACH_CALLS: Cell<usize> = Cell::new(0);
    }

    fn reset_counters() {
        ADD_CALLS.with(|c| c.set(0));
        REMOVE_CALLS.with(|c| c.set(0));
        DETACH_CALLS.with(|c| c.set(0));
    }

    struct Counting;

    impl Policy<i32> for Counting {
        fn on_add(value: i32) -> i32 {
            ADD_CALLS.with(|c| c.set(c.get() + 1));
            value
        }

        fn on_remove(value: i32) {
            REMOVE_CALLS.with(|c| c.set(c.get() + 1));
            drop(value);
        }

        fn on_detach(value: i32) -> i32 {
            DETACH_CALLS.with(|c| c.set(c.get() + 1));
            value
        }
    }

    #[test]
    fn test_new() {
        let vec: GrowVec<i32> = GrowVec::new();
        assert_eq!(vec.len(), 0);
        assert_eq!(vec.capacity(), 0);
        assert!(vec.is_empty());
    }

    #[test]
    fn test_push_growth_minimum() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        vec.push(1).unwrap();
        assert!(vec.capacity() >= 16);

        for i in 2..=100 {
            vec.push(i).unwrap();
        }
        assert_eq!(vec.len(), 100);
        assert_eq!(vec[99], 100);
    }

    #[test]
    fn test_push_returns_index() {
        let mut vec: GrowVec<&str> = GrowVec::new();
        assert_eq!(vec.push("a").unwrap(), 0);
        assert_eq!(vec.push("b").unwrap(), 1);
    }

    #[test]
    fn test_insert_remove() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        vec.push(1).unwrap();
        vec.push(3).unwrap();

        vec.insert_at(1, 2).unwrap();
        assert_eq!(vec.as_slice(), &[1, 2, 3]);

        vec.insert_at(0, 0).unwrap();
        vec.insert_at(4, 4).unwrap();
        assert_eq!(vec.as_slice(), &[0, 1, 2, 3, 4]);

        vec.remove_at(0);
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4]);

        vec.remove_range(1, 2);
        assert_eq!(vec.as_slice(), &[1, 4]);
    }

    #[test]
    fn test_detach_at() {
        let mut vec: GrowVec<Box<i32>> = GrowVec::new();
        vec.push(Box::new(1)).unwrap();
        vec.push(Box::new(2)).unwrap();
        vec.push(Box::new(3)).unwrap();

        let boxed = vec.detach_at(1);
        assert_eq!(*boxed, 2);
        assert_eq!(vec.len(), 2);
        assert_eq!(*vec[1], 3);
    }

    #[test]
    fn test_detach_all() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for i in 0..5 {
            vec.push(i).unwrap();
        }
        let all = vec.detach_all();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
        assert!(vec.is_empty());
    }

    #[test]
    fn test_replace_at() {
        let mut vec: GrowVec<String> = GrowVec::new();
        vec.push("old".to_string()).unwrap();
        vec.replace_at(0, "new".to_string());
        assert_eq!(vec[0], "new");
        assert_eq!(vec.len(), 1);
    }

    #[test]
    fn test_swap_and_move() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for i in 0..6 {
            vec.push(i).unwrap();
        }

        vec.swap_items(0, 5);
        assert_eq!(vec.as_slice(), &[5, 1, 2, 3, 4, 0]);

        vec.swap_items(0, 5);
        vec.move_item(1, 4);
        assert_eq!(vec.as_slice(), &[0, 2, 3, 4, 1, 5]);

        vec.move_item(4, 1);
        assert_eq!(vec.as_slice(), &[0, 1, 2, 3, 4, 5]);

        vec.move_item(2, 2);
        assert_eq!(vec.as_slice(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_swap_with_exchanges_buffers() {
        reset_counters();
        let mut a: GrowVec<i32, Counting> = GrowVec::new();
        let mut b: GrowVec<i32, Counting> = GrowVec::new();
        for v in [1, 2, 3] {
            a.push(v).unwrap();
        }
        b.push(9).unwrap();
        let add_before = ADD_CALLS.with(|c| c.get());
        let remove_before = REMOVE_CALLS.with(|c| c.get());

        a.swap_with(&mut b);
        assert_eq!(a.as_slice(), &[9]);
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert_eq!(ADD_CALLS.with(|c| c.get()), add_before);
        assert_eq!(REMOVE_CALLS.with(|c| c.get()), remove_before);

        a.swap_with(&mut b);
        assert_eq!(a.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_ref_iteration() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for v in [1, 2, 3] {
            vec.push(v).unwrap();
        }

        let mut total = 0;
        for v in &vec {
            total += *v;
        }
        assert_eq!(total, 6);

        for v in &mut vec {
            *v *= 10;
        }
        assert_eq!(vec.as_slice(), &[10, 20, 30]);
    }

    #[test]
    fn test_find_and_find_after() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for v in [5, 3, 5, 1] {
            vec.push(v).unwrap();
        }

        assert_eq!(vec.find(&5), Some(0));
        assert_eq!(vec.find_after(0, &5), Some(2));
        assert_eq!(vec.find_after(2, &5), None);
        assert_eq!(vec.find(&9), None);
    }

    #[test]
    fn test_remove_detach_by_value() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for v in [10, 20, 30] {
            vec.push(v).unwrap();
        }

        assert_eq!(vec.remove(&20), Some(1));
        assert_eq!(vec.as_slice(), &[10, 30]);
        assert_eq!(vec.remove(&99), None);

        assert_eq!(vec.detach(&30), Some(30));
        assert_eq!(vec.as_slice(), &[10]);
    }

    #[test]
    fn test_sort_and_binary_search() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for v in [9, 2, 7, 1, 8, 3, 6, 0, 5, 4] {
            vec.push(v).unwrap();
        }
        vec.sort();
        assert_eq!(vec.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        for v in 0..10 {
            assert_eq!(vec.binary_search(&v), Ok(v as usize));
        }
        assert_eq!(vec.binary_search(&10), Err(10));
        assert_eq!(vec.binary_search(&-1), Err(0));
    }

    #[test]
    fn test_binary_search_large() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for v in 0..1000 {
            vec.push(v * 2).unwrap();
        }

        assert_eq!(vec.binary_search(&500), Ok(250));
        assert_eq!(vec.binary_search(&501), Err(251));
        assert_eq!(vec.binary_search(&-5), Err(0));
        assert_eq!(vec.binary_search(&2000), Err(1000));
    }

    #[test]
    fn test_sort_by_descending() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for v in [1, 3, 2] {
            vec.push(v).unwrap();
        }
        vec.sort_by(|a, b| b.cmp(a));
        assert_eq!(vec.as_slice(), &[3, 2, 1]);
    }

    #[test]
    fn test_set_size() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        vec.set_size(5, &7).unwrap();
        assert_eq!(vec.as_slice(), &[7, 7, 7, 7, 7]);

        vec.set_size(2, &0).unwrap();
        assert_eq!(vec.as_slice(), &[7, 7]);
    }

    #[test]
    fn test_free_extra() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        for i in 0..5 {
            vec.push(i).unwrap();
        }
        assert!(vec.capacity() > 5);
        vec.free_extra().unwrap();
        assert_eq!(vec.capacity(), 5);
        assert_eq!(vec.as_slice(), &[0, 1, 2, 3, 4]);

        vec.clear();
        vec.free_extra().unwrap();
        assert_eq!(vec.capacity(), 0);
    }

    #[test]
    fn test_stack_and_queue_helpers() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        vec.push(1).unwrap();
        vec.push(2).unwrap();
        vec.enqueue(3).unwrap();

        assert_eq!(vec.top(), Some(&3));
        assert_eq!(vec.pop(), Some(3));
        assert_eq!(vec.peek(), Some(&1));
        assert_eq!(vec.dequeue(), Some(1));
        assert_eq!(vec.as_slice(), &[2]);

        vec.clear();
        assert_eq!(vec.pop(), None);
        assert_eq!(vec.dequeue(), None);
        assert_eq!(vec.top(), None);
        assert_eq!(vec.peek(), None);
    }

    #[test]
    fn test_policy_hooks_fire() {
        reset_counters();
        {
            let mut vec: GrowVec<i32, Counting> = GrowVec::new();
            vec.push(1).unwrap();
            vec.push(2).unwrap();
            vec.push(3).unwrap();
            assert_eq!(ADD_CALLS.with(|c| c.get()), 3);

            vec.remove_at(0);
            assert_eq!(REMOVE_CALLS.with(|c| c.get()), 1);

            let _ = vec.detach_at(0);
            assert_eq!(DETACH_CALLS.with(|c| c.get()), 1);

            vec.replace_at(0, 9);
            assert_eq!(REMOVE_CALLS.with(|c| c.get()), 2);
            assert_eq!(ADD_CALLS.with(|c| c.get()), 4);
        }
        // Drop removes the final element.
        assert_eq!(REMOVE_CALLS.with(|c| c.get()), 3);
    }

    #[test]
    fn test_swap_and_move_skip_hooks() {
        reset_counters();
        let mut vec: GrowVec<i32, Counting> = GrowVec::new();
        vec.push(1).unwrap();
        vec.push(2).unwrap();
        vec.push(3).unwrap();
        let adds = ADD_CALLS.with(|c| c.get());

        vec.swap_items(0, 2);
        vec.move_item(0, 1);
        assert_eq!(ADD_CALLS.with(|c| c.get()), adds);
        assert_eq!(REMOVE_CALLS.with(|c| c.get()), 0);
        assert_eq!(DETACH_CALLS.with(|c| c.get()), 0);
    }

    #[test]
    fn test_insert_slice_at() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        vec.push(1).unwrap();
        vec.push(5).unwrap();

        vec.insert_slice_at(1, &[2, 3, 4]).unwrap();
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5]);

        vec.extend_from_slice(&[6, 7]).unwrap();
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_clone() {
        let mut vec: GrowVec<String> = GrowVec::new();
        vec.push("a".to_string()).unwrap();
        vec.push("b".to_string()).unwrap();

        let cloned = vec.clone();
        assert_eq!(vec, cloned);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_insert_out_of_range() {
        let mut vec: GrowVec<i32> = GrowVec::new();
        vec.insert_at(1, 0).unwrap();
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range() {
        let vec: GrowVec<i32> = GrowVec::new();
        let _ = vec[0];
    }
}
