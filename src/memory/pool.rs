//! Segmented block allocator for container nodes
//!
//! [`BlockPool`] carves fixed-size blocks out of the global allocator and
//! serves individual slots from them, addressed by dense `u32` indices. Freed
//! slots are threaded onto an intrusive free list and reused before any new
//! block is allocated. Nodes never move, so an index stays valid until it is
//! freed.

use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::mem::{self, ManuallyDrop};
use std::ptr::NonNull;

use crate::error::{PlinthError, Result};

/// Reserved index meaning "no slot".
pub const NIL: u32 = u32::MAX;

/// Target byte footprint of one block when no explicit size is given.
const DEFAULT_BLOCK_BYTES: usize = 256;

/// A pool slot is either a live value or a link in the free list.
union Slot<T> {
    value: ManuallyDrop<T>,
    next_free: u32,
}

/// Segmented slot allocator with stable `u32` indices.
///
/// Blocks are only released in bulk: when the last live slot is freed the
/// whole pool returns its memory to the allocator. This keeps teardown of
/// large containers cheap and avoids per-node free traffic.
pub struct BlockPool<T> {
    blocks: Vec<NonNull<Slot<T>>>,
    block_size: usize,
    free_head: u32,
    len: usize,
}

impl<T> BlockPool<T> {
    /// Create a pool with a block size chosen from the element footprint.
    pub fn new() -> Self {
        let per_block = (DEFAULT_BLOCK_BYTES - mem::size_of::<*const u8>())
            / mem::size_of::<Slot<T>>();
        Self::with_block_size(per_block)
    }

    /// Create a pool with `block_size` slots per block.
    ///
    /// Sizes below 4 are raised to 4.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            block_size: block_size.max(4),
            free_head: NIL,
            len: 0,
        }
    }

    /// Number of live slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no slots are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots per block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently allocated.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Change the block size.
    ///
    /// # Panics
    ///
    /// Panics if any block has been allocated.
    pub fn set_block_size(&mut self, block_size: usize) {
        assert!(
            self.blocks.is_empty(),
            "block size can only change while the pool is empty"
        );
        self.block_size = block_size.max(4);
    }

    /// Store `value` in a free slot and return its index.
    pub fn alloc(&mut self, value: T) -> Result<u32> {
        if self.free_head == NIL {
            self.grow()?;
        }
        let idx = self.free_head;
        let slot = self.slot_ptr(idx);
        // SAFETY: idx came off the free list, so the slot holds a link and
        // may be overwritten with a live value.
        unsafe {
            self.free_head = (*slot).next_free;
            (*slot).value = ManuallyDrop::new(value);
        }
        self.len += 1;
        Ok(idx)
    }

    /// Take the value out of slot `idx` and return the slot to the free list.
    ///
    /// Freeing the last live slot releases all blocks back to the allocator.
    ///
    /// # Safety
    ///
    /// `idx` must identify a live slot returned by [`alloc`](Self::alloc)
    /// and not freed since.
    pub unsafe fn free(&mut self, idx: u32) -> T {
        let slot = self.slot_ptr(idx);
        // SAFETY: caller guarantees the slot is live.
        let value = unsafe { ManuallyDrop::take(&mut (*slot).value) };
        self.len -= 1;
        if self.len == 0 {
            self.release_blocks();
        } else {
            // SAFETY: the slot is dead now and becomes a free list link.
            unsafe {
                (*slot).next_free = self.free_head;
            }
            self.free_head = idx;
        }
        value
    }

    /// Borrow the value in slot `idx`.
    ///
    /// # Safety
    ///
    /// `idx` must identify a live slot.
    #[inline]
    pub unsafe fn get(&self, idx: u32) -> &T {
        let slot = self.slot_ptr(idx);
        // SAFETY: caller guarantees the slot is live.
        unsafe { &*(*slot).value }
    }

    /// Mutably borrow the value in slot `idx`.
    ///
    /// # Safety
    ///
    /// `idx` must identify a live slot.
    #[inline]
    pub unsafe fn get_mut(&mut self, idx: u32) -> &mut T {
        let slot = self.slot_ptr(idx);
        // SAFETY: caller guarantees the slot is live.
        unsafe { &mut *(*slot).value }
    }

    /// Release all blocks without running any destructors.
    ///
    /// Live values are leaked. Containers drain themselves before calling
    /// this.
    pub fn clear(&mut self) {
        self.release_blocks();
        self.len = 0;
    }

    #[inline]
    fn slot_ptr(&self, idx: u32) -> *mut Slot<T> {
        let idx = idx as usize;
        let block = idx / self.block_size;
        let offset = idx % self.block_size;
        // SAFETY: offset < block_size by construction; the block pointer is
        // owned by this pool.
        unsafe { self.blocks[block].as_ptr().add(offset) }
    }

    fn block_layout(&self) -> Result<Layout> {
        Layout::array::<Slot<T>>(self.block_size).map_err(|_| {
            PlinthError::out_of_memory(
                self.block_size.saturating_mul(mem::size_of::<Slot<T>>()),
            )
        })
    }

    /// Allocate one more block and thread its slots onto the free list.
    fn grow(&mut self) -> Result<()> {
        let total = (self.blocks.len() + 1).saturating_mul(self.block_size);
        if total > NIL as usize {
            return Err(PlinthError::capacity_exceeded(NIL as usize));
        }
        let layout = self.block_layout()?;
        // SAFETY: Slot<T> is at least 4 bytes, so the layout is never
        // zero-sized.
        let ptr = unsafe { alloc(layout) } as *mut Slot<T>;
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => return Err(PlinthError::out_of_memory(layout.size())),
        };

        let base = (self.blocks.len() * self.block_size) as u32;
        for i in 0..self.block_size {
            let next = if i + 1 == self.block_size {
                self.free_head
            } else {
                base + i as u32 + 1
            };
            // SAFETY: i < block_size, within the fresh allocation.
            unsafe {
                ptr.as_ptr().add(i).write(Slot { next_free: next });
            }
        }
        self.free_head = base;
        self.blocks.push(ptr);
        log::trace!(
            "pool grew to {} block(s) of {} slots",
            self.blocks.len(),
            self.block_size
        );
        Ok(())
    }

    fn release_blocks(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let layout = match self.block_layout() {
            Ok(layout) => layout,
            // Unreachable once a block exists; keep the memory rather than
            // deallocate with a mismatched layout.
            Err(_) => return,
        };
        log::trace!("pool releasing {} block(s)", self.blocks.len());
        for block in self.blocks.drain(..) {
            // SAFETY: every block was allocated with this layout.
            unsafe {
                dealloc(block.as_ptr() as *mut u8, layout);
            }
        }
        self.free_head = NIL;
    }
}

impl<T> Default for BlockPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BlockPool<T> {
    fn drop(&mut self) {
        self.release_blocks();
    }
}

impl<T> fmt::Debug for BlockPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("len", &self.len)
            .field("blocks", &self.blocks.len())
            .field("block_size", &self.block_size)
            .finish()
    }
}

// SAFETY: the pool owns its slots; aliasing is governed by the unsafe
// accessors above.
unsafe impl<T: Send> Send for BlockPool<T> {}
unsafe impl<T: Sync> Sync for BlockPool<T> {}
