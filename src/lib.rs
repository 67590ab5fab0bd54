//! # Plinth: Pooled Collections with Pluggable Ownership Policies
//!
//! This crate provides a family of collection types whose element handling
//! is parameterized by policy traits, so one container definition serves
//! plain values, case-insensitive string keys, and custom resource
//! lifecycles alike.
//!
//! ## Key Features
//!
//! - **Ownership Policies**: `on_add`, `on_remove`, and `on_detach` hooks
//!   threaded through every container, with case-insensitive comparison and
//!   hashing for string keys
//! - **Pooled Nodes**: Linked containers allocate nodes from segmented
//!   block pools instead of one heap allocation per element
//! - **Cursor Navigation**: Lists and maps carry a navigation cursor with
//!   explicit begin and end states plus a cached positional cursor that
//!   makes sequential indexed access O(1)
//! - **Ordered and Hashed Maps**: A red-black tree map threaded with an
//!   in-order chain, and a hash map that iterates in insertion order
//! - **Bounded Buffering**: A fixed-capacity ring buffer with a latched
//!   overflow flag for single-producer single-consumer pipelines
//!
//! ## Quick Start
//!
//! ```rust
//! use plinth::{CursorList, GrowVec, LinkedHashMap, OrderedMap, RingBuffer};
//!
//! // Growable vector with policy hooks
//! let mut vec: GrowVec<i32> = GrowVec::new();
//! vec.push(42)?;
//!
//! // Ordered map, iterated in key order
//! let mut map: OrderedMap<&str, i32> = OrderedMap::new();
//! map.insert("b", 2)?;
//! map.insert("a", 1)?;
//! assert_eq!(map.get_at(0), (&"a", &1));
//!
//! // Hash map, iterated in insertion order
//! let mut hash: LinkedHashMap<String, i32> = LinkedHashMap::new();
//! hash.insert("first".to_string(), 1)?;
//! hash.insert("second".to_string(), 2)?;
//! assert_eq!(*hash.get_at(1).1, 2);
//!
//! // List with a navigation cursor
//! let mut list: CursorList<&str> = CursorList::new();
//! list.push_back("x")?;
//! list.move_first();
//! assert_eq!(list.current(), Some(&"x"));
//!
//! // Bounded ring buffer
//! let mut ring: RingBuffer<u32> = RingBuffer::with_capacity(8)?;
//! ring.enqueue(1u32).map_err(|_| plinth::PlinthError::capacity_exceeded(8))?;
//! assert_eq!(ring.dequeue(), Some(1));
//! # Ok::<(), plinth::PlinthError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod containers;
pub mod error;
pub mod memory;
pub mod policy;

// Re-export core types
pub use containers::{CursorList, GrowVec, LinkedHashMap, OrderedMap, RingBuffer, SortedVec};
pub use error::{PlinthError, Result};
pub use memory::{BlockPool, NIL};
pub use policy::{
    CaseInsensitive, CaseSensitive, ComparePolicy, KeyPolicy, Policy, Value,
    compare_ignore_ascii_case, hash_ignore_ascii_case,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default settings
pub fn init() {
    log::debug!("Initializing plinth v{}", VERSION);
}
