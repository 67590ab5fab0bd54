//! Container types with pluggable ownership policies
//!
//! Every container in this module threads its element handling through the
//! policy traits in [`crate::policy`], so the same structure can hold plain
//! values, case-insensitive keys, or anything with custom add, remove, and
//! detach behavior.
//!
//! - **`GrowVec<T, P>`** - growable vector using realloc for growth
//! - **`SortedVec<T, P>`** - vector kept sorted under a compare policy
//! - **`CursorList<T, P>`** - pooled linked list with a navigation cursor
//! - **`OrderedMap<K, V, KP, VP>`** - red-black tree map with in-order chain
//! - **`LinkedHashMap<K, V, KP, VP>`** - hash map with insertion-order access
//! - **`RingBuffer<T, P>`** - bounded FIFO with a latched overflow flag

pub mod linked_hash_map;
pub mod list;
pub mod ordered_map;
pub mod ring;
pub mod sorted_vec;
pub mod vec;

pub use linked_hash_map::LinkedHashMap;
pub use list::CursorList;
pub use ordered_map::OrderedMap;
pub use ring::RingBuffer;
pub use sorted_vec::SortedVec;
pub use vec::GrowVec;
