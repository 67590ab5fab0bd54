//! Ownership and comparison policies for the pooled containers
//!
//! Every container is parameterized by a policy marker that decides what
//! happens when an element enters (`on_add`), leaves for destruction
//! (`on_remove`), or leaves with ownership transferred to the caller
//! (`on_detach`), plus how elements are ordered and hashed.
//!
//! The default [`Value`] policy is the identity: elements are moved in, moved
//! out, and dropped in place, with `Ord`/`Hash` supplying comparisons. Rust's
//! ownership rules already cover the owned-pointer and reference-counted
//! element styles (`Box`, `Rc`, `Arc` behave correctly under `Value`), so
//! custom policies are only needed for side effects at the container boundary
//! or for alternative orderings such as [`CaseInsensitive`].
//!
//! # Examples
//!
//! ```
//! use plinth::policy::{CaseInsensitive, ComparePolicy, Value};
//! use std::cmp::Ordering;
//!
//! assert_eq!(<Value as ComparePolicy<i32>>::compare(&1, &2), Ordering::Less);
//!
//! let a: String = "Key".into();
//! let b: String = "kEY".into();
//! assert_eq!(<CaseInsensitive as ComparePolicy<String>>::compare(&a, &b), Ordering::Equal);
//! ```

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// Element lifecycle hooks invoked at the container boundary.
///
/// `on_add` runs as an element is stored, `on_remove` when the container
/// destroys an element it still owns, and `on_detach` when ownership is
/// handed back to the caller. Implementations must not touch the container
/// that invoked them.
pub trait Policy<T> {
    /// Transform or observe a value as it enters a container.
    fn on_add(value: T) -> T {
        value
    }

    /// Dispose of a value the container is destroying.
    fn on_remove(value: T) {
        drop(value);
    }

    /// Release a value back to the caller without destroying it.
    fn on_detach(value: T) -> T {
        value
    }
}

/// A [`Policy`] that can also order elements.
///
/// Sorted and tree-backed containers require their element policy to supply
/// a total order.
pub trait ComparePolicy<T>: Policy<T> {
    /// Three-way comparison between two stored elements.
    fn compare(a: &T, b: &T) -> Ordering;
}

/// A [`ComparePolicy`] that can also hash elements.
///
/// Hashed containers require consistency: keys that compare equal must feed
/// identical bytes to the hasher.
pub trait KeyPolicy<T>: ComparePolicy<T> {
    /// Feed the key's identity into `state`.
    fn write_hash<H: Hasher>(key: &T, state: &mut H);
}

/// The default pass-through policy.
///
/// Lifecycle hooks are the identity, ordering comes from `Ord` and hashing
/// from `Hash`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Value;

impl<T> Policy<T> for Value {}

impl<T: Ord> ComparePolicy<T> for Value {
    #[inline]
    fn compare(a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: Ord + Hash> KeyPolicy<T> for Value {
    #[inline]
    fn write_hash<H: Hasher>(key: &T, state: &mut H) {
        key.hash(state);
    }
}

/// Byte-wise ordering of strings, exact case.
///
/// An alias for [`Value`]: the derived `Ord`/`Hash` of the string types are
/// already case sensitive.
pub type CaseSensitive = Value;

/// ASCII case-folded ordering and hashing for string keys.
///
/// Comparison lowercases each byte before the three-way compare, with the
/// shorter string ordering first on ties. Hashing feeds lowercased bytes so
/// that keys differing only in ASCII case collide into the same bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaseInsensitive;

impl<T> Policy<T> for CaseInsensitive {}

/// Three-way string comparison ignoring ASCII case.
pub fn compare_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    let mut lhs = a.bytes();
    let mut rhs = b.bytes();
    loop {
        match (lhs.next(), rhs.next()) {
            (Some(x), Some(y)) => {
                let x = x.to_ascii_lowercase();
                let y = y.to_ascii_lowercase();
                if x != y {
                    return x.cmp(&y);
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Hash a string's ASCII-lowercased bytes into `state`.
pub fn hash_ignore_ascii_case<H: Hasher>(key: &str, state: &mut H) {
    for byte in key.bytes() {
        state.write_u8(byte.to_ascii_lowercase());
    }
    // Terminator byte, same prefix-freedom scheme as str's Hash impl.
    state.write_u8(0xff);
}

macro_rules! impl_case_insensitive {
    ($($t:ty),* $(,)?) => {$(
        impl ComparePolicy<$t> for CaseInsensitive {
            #[inline]
            fn compare(a: &$t, b: &$t) -> Ordering {
                compare_ignore_ascii_case(a.as_ref(), b.as_ref())
            }
        }

        impl KeyPolicy<$t> for CaseInsensitive {
            #[inline]
            fn write_hash<H: Hasher>(key: &$t, state: &mut H) {
                hash_ignore_ascii_case(key.as_ref(), state);
            }
        }
    )*};
}

impl_case_insensitive!(String, Box<str>, Rc<str>, Arc<str>);

impl<'a> ComparePolicy<&'a str> for CaseInsensitive {
    #[inline]
    fn compare(a: &&'a str, b: &&'a str) -> Ordering {
        compare_ignore_ascii_case(a, b)
    }
}

impl<'a> KeyPolicy<&'a str> for CaseInsensitive {
    #[inline]
    fn write_hash<H: Hasher>(key: &&'a str, state: &mut H) {
        hash_ignore_ascii_case(key, state);
    }
}
