//! RingBuffer: fixed-capacity queue for single-producer single-consumer use
//!
//! A flat buffer with a read cursor owned by the consumer side and a write
//! cursor owned by the producer side. The element count is atomic and is
//! the only state both sides touch, so observers get a coherent length
//! while either cursor moves.
//!
//! A full buffer rejects the enqueue, hands the value back, and latches a
//! sticky overflow flag. The flag stays set through any number of
//! successful operations until [`clear`](RingBuffer::clear) resets it, so
//! a reader draining the buffer can tell that data was dropped upstream.
//!
//! Dequeuing runs the policy's detach hook, not the remove hook: the value
//! leaves the buffer alive and ownership moves to the caller.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::Index;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{PlinthError, Result};
use crate::policy::{Policy, Value};

/// Bounded FIFO with a latched overflow flag.
///
/// # Examples
///
/// ```rust
/// use plinth::RingBuffer;
///
/// let mut ring: RingBuffer<i32> = RingBuffer::with_capacity(4)?;
/// for i in 0..4 {
///     assert!(ring.enqueue(i).is_ok());
/// }
///
/// // The fifth value bounces back and the overflow flag latches.
/// assert_eq!(ring.enqueue(4), Err(4));
/// assert!(ring.is_overflow());
///
/// assert_eq!(ring.dequeue(), Some(0));
/// assert!(ring.is_overflow());
/// # Ok::<(), plinth::PlinthError>(())
/// ```
pub struct RingBuffer<T, P: Policy<T> = Value> {
    buffer: NonNull<T>,
    capacity: usize,
    read: usize,
    write: usize,
    size: AtomicUsize,
    overflow: AtomicBool,
    _policy: PhantomData<P>,
}

impl<T, P: Policy<T>> RingBuffer<T, P> {
    /// Create a buffer holding at most `capacity` elements. A capacity of
    /// zero is legal and produces a buffer that is permanently full.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let buffer = Self::alloc_buffer(capacity)?;
        Ok(Self {
            buffer,
            capacity,
            read: 0,
            write: 0,
            size: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
            _policy: PhantomData,
        })
    }

    fn alloc_buffer(capacity: usize) -> Result<NonNull<T>> {
        let layout = Layout::array::<T>(capacity)
            .map_err(|_| PlinthError::out_of_memory(capacity.saturating_mul(size_of::<T>())))?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        // SAFETY: the layout has nonzero size.
        let raw = unsafe { alloc::alloc(layout) as *mut T };
        NonNull::new(raw).ok_or_else(|| PlinthError::out_of_memory(layout.size()))
    }

    fn release_buffer(&mut self) {
        let layout = Layout::array::<T>(self.capacity).unwrap();
        if layout.size() != 0 {
            // SAFETY: the buffer came from alloc with this same layout.
            unsafe { alloc::dealloc(self.buffer.as_ptr() as *mut u8, layout) };
        }
    }

    /// Maximum number of elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer is at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Check whether an enqueue has been rejected since the last clear.
    #[inline]
    pub fn is_overflow(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    #[inline]
    fn slot_ptr(&self, idx: usize) -> *mut T {
        // SAFETY: callers keep idx below capacity; for a zero-size layout
        // the add is a no-op on the dangling pointer.
        unsafe { self.buffer.as_ptr().add(idx) }
    }

    #[inline]
    fn advance(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.capacity { 0 } else { next }
    }

    #[inline]
    fn rewind(&self, idx: usize) -> usize {
        if idx == 0 { self.capacity - 1 } else { idx - 1 }
    }

    /// Add `value` at the write end.
    ///
    /// A full buffer hands the value back as `Err` and latches the
    /// overflow flag.
    pub fn enqueue(&mut self, value: T) -> std::result::Result<(), T> {
        if self.is_full() {
            self.overflow.store(true, Ordering::Release);
            return Err(value);
        }

        let write = self.write;
        // SAFETY: the buffer is not full, so this slot is vacant.
        unsafe { ptr::write(self.slot_ptr(write), P::on_add(value)) };
        self.write = self.advance(write);

        // The count moves only after the slot holds the value.
        self.size.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Take the oldest element off the read end.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let read = self.read;
        // SAFETY: the buffer is not empty, so this slot holds a value.
        let value = unsafe { ptr::read(self.slot_ptr(read)) };
        self.read = self.advance(read);
        self.size.fetch_sub(1, Ordering::AcqRel);

        Some(P::on_detach(value))
    }

    /// Take back the most recently enqueued element, rewinding the write
    /// cursor. The producer-side undo of [`enqueue`](Self::enqueue).
    pub fn unenqueue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let write = self.rewind(self.write);
        self.write = write;
        // SAFETY: the buffer is not empty, so the slot before the write
        // cursor holds the newest value.
        let value = unsafe { ptr::read(self.slot_ptr(write)) };
        self.size.fetch_sub(1, Ordering::AcqRel);

        Some(P::on_detach(value))
    }

    /// Borrow the oldest element.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the buffer is not empty.
        Some(unsafe { &*self.slot_ptr(self.read) })
    }

    /// Borrow the newest element.
    pub fn peek_last(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        Some(self.get_at(self.len() - 1))
    }

    /// Borrow the element `pos` places after the read end.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn get_at(&self, pos: usize) -> &T {
        let len = self.len();
        assert!(pos < len, "position {} out of range for length {}", pos, len);

        let mut idx = self.read + pos;
        if idx >= self.capacity {
            idx -= self.capacity;
        }
        // SAFETY: pos is within the live span starting at the read cursor.
        unsafe { &*self.slot_ptr(idx) }
    }

    /// Drain every element and reset the overflow flag.
    pub fn clear(&mut self) {
        while self.dequeue().is_some() {}
        self.overflow.store(false, Ordering::Release);
    }

    /// Drain the buffer and, for a nonzero capacity different from the
    /// current one, reallocate at the new capacity. `reset_with_capacity(0)`
    /// just clears.
    pub fn reset_with_capacity(&mut self, capacity: usize) -> Result<()> {
        self.clear();
        if capacity != 0 && capacity != self.capacity {
            let buffer = Self::alloc_buffer(capacity)?;
            self.release_buffer();
            self.buffer = buffer;
            self.capacity = capacity;
            self.read = 0;
            self.write = 0;
        }
        Ok(())
    }
}

impl<T, P: Policy<T>> Drop for RingBuffer<T, P> {
    fn drop(&mut self) {
        self.clear();
        self.release_buffer();
    }
}

impl<T, P: Policy<T>> Index<usize> for RingBuffer<T, P> {
    type Output = T;

    fn index(&self, pos: usize) -> &T {
        self.get_at(pos)
    }
}

impl<T: fmt::Debug, P: Policy<T>> fmt::Debug for RingBuffer<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.len()).map(|pos| self.get_at(pos)))
            .finish()
    }
}

// SAFETY: the buffer owns its elements. Mutation is bounded by &mut;
// shared references only reach &T and the atomic count, so the bounds
// mirror Vec's.
unsafe impl<T: Send, P: Policy<T>> Send for RingBuffer<T, P> {}
unsafe impl<T: Sync, P: Policy<T>> Sync for RingBuffer<T, P> {}
