//! Memory management for the pooled containers
//!
//! The node-based containers all draw their nodes from a [`BlockPool`], a
//! segmented allocator that hands out stable `u32` indices instead of
//! pointers.

pub mod pool;

pub use pool::{BlockPool, NIL};
