//! SortedVec: a GrowVec kept permanently in policy order
//!
//! Insertion locates its slot with the hybrid binary search, so lookups stay
//! O(log n) without a separate sort step. Equal elements are permitted and
//! sit adjacently, in no particular order among themselves.

use std::fmt;
use std::ops::{Deref, Index};

use crate::containers::GrowVec;
use crate::error::Result;
use crate::policy::{ComparePolicy, Value};

/// A vector ordered by its compare policy.
pub struct SortedVec<T, P: ComparePolicy<T> = Value> {
    inner: GrowVec<T, P>,
}

impl<T, P: ComparePolicy<T>> SortedVec<T, P> {
    /// Create a new empty sorted vector.
    pub fn new() -> Self {
        Self {
            inner: GrowVec::new(),
        }
    }

    /// Create a sorted vector with the specified capacity.
    pub fn with_capacity(cap: usize) -> Result<Self> {
        Ok(Self {
            inner: GrowVec::with_capacity(cap)?,
        })
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// View the elements in order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    /// Insert `value` at its ordered position and return that position.
    pub fn add(&mut self, value: T) -> Result<usize> {
        let pos = match self.inner.binary_search(&value) {
            Ok(pos) => pos,
            Err(pos) => pos,
        };
        self.inner.insert_at(pos, value)?;
        Ok(pos)
    }

    /// Locate an element comparing equal to `value`.
    pub fn find(&self, value: &T) -> Option<usize> {
        self.inner.binary_search(value).ok()
    }

    /// Check whether an equal element is present.
    pub fn contains(&self, value: &T) -> bool {
        self.find(value).is_some()
    }

    /// Remove the element at `pos`, running the removal hook.
    pub fn remove_at(&mut self, pos: usize) {
        self.inner.remove_at(pos);
    }

    /// Take the element at `pos` out, running the detach hook.
    pub fn detach_at(&mut self, pos: usize) -> T {
        self.inner.detach_at(pos)
    }

    /// Remove the first element comparing equal to `value`.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.find(value) {
            Some(pos) => {
                self.inner.remove_at(pos);
                true
            }
            None => false,
        }
    }

    /// Detach the first element comparing equal to `value`.
    pub fn detach(&mut self, value: &T) -> Option<T> {
        let pos = self.find(value)?;
        Some(self.inner.detach_at(pos))
    }

    /// Remove everything, running removal hooks.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Consume the wrapper and return the underlying vector.
    pub fn into_inner(self) -> GrowVec<T, P> {
        self.inner
    }
}

impl<T, P: ComparePolicy<T>> Default for SortedVec<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: ComparePolicy<T>> Deref for SortedVec<T, P> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.inner.as_slice()
    }
}

impl<T, P: ComparePolicy<T>> Index<usize> for SortedVec<T, P> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.inner[index]
    }
}

impl<T: fmt::Debug, P: ComparePolicy<T>> fmt::Debug for SortedVec<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
