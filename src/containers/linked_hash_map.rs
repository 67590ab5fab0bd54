//! LinkedHashMap: chained hash map that remembers insertion order
//!
//! Buckets hold singly linked collision chains of pooled nodes, and every
//! node also sits on a navigation list in insertion order. Iteration and
//! positional access follow that list, so they are deterministic no matter
//! how the keys hash.
//!
//! The bucket table is a power of two, at least 64 slots, and doubles when
//! the entry count would pass 70% of it. The table only materializes on the
//! first insert; an empty map owns nothing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::marker::PhantomData;
use std::ptr;

use crate::containers::list::{link_next, Linked, ListLinks, RawList};
use crate::containers::GrowVec;
use crate::error::Result;
use crate::memory::{BlockPool, NIL};
use crate::policy::{ComparePolicy, KeyPolicy, Policy, Value};

const MIN_TABLE_SIZE: usize = 64;
const LOAD_FACTOR_PERCENT: usize = 70;

struct HashNode<K, V> {
    key: K,
    value: V,
    hash_next: u32,
    links: ListLinks,
}

impl<K, V> Linked for HashNode<K, V> {
    #[inline]
    fn links(&self) -> &ListLinks {
        &self.links
    }

    #[inline]
    fn links_mut(&mut self) -> &mut ListLinks {
        &mut self.links
    }
}

/// Hash map with insertion-order iteration and positional access.
///
/// # Examples
///
/// ```rust
/// use plinth::LinkedHashMap;
///
/// let mut map: LinkedHashMap<String, i32> = LinkedHashMap::new();
/// map.insert("one".to_string(), 1)?;
/// map.insert("two".to_string(), 2)?;
///
/// assert_eq!(map.get(&"one".to_string()), Some(&1));
/// // Entries keep their insertion order.
/// let (key, value) = map.get_at(1);
/// assert_eq!((key.as_str(), *value), ("two", 2));
/// # Ok::<(), plinth::PlinthError>(())
/// ```
pub struct LinkedHashMap<K, V, KP = Value, VP = Value>
where
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    pool: BlockPool<HashNode<K, V>>,
    table: GrowVec<u32>,
    nav: RawList,
    hasher: ahash::RandomState,
    mask: usize,
    threshold: usize,
    table_size_hint: usize,
    _policies: PhantomData<(KP, VP)>,
}

impl<K, V, KP, VP> LinkedHashMap<K, V, KP, VP>
where
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    /// Create a new empty map. No table is allocated until the first
    /// insert.
    pub fn new() -> Self {
        Self::with_table_size(0)
    }

    /// Create a map whose first table allocation covers at least
    /// `table_size` buckets, rounded up to a power of two.
    pub fn with_table_size(table_size: usize) -> Self {
        Self {
            pool: BlockPool::new(),
            table: GrowVec::new(),
            nav: RawList::new(),
            hasher: ahash::RandomState::new(),
            mask: 0,
            threshold: 0,
            table_size_hint: table_size,
            _policies: PhantomData,
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.nav.len()
    }

    /// Check if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nav.is_empty()
    }

    /// Current bucket count. Zero until the first insert allocates the
    /// table; doubles whenever the load factor passes its threshold.
    #[inline]
    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    fn bucket_of(&self, key: &K) -> usize {
        let mut hasher = self.hasher.build_hasher();
        KP::write_hash(key, &mut hasher);
        (hasher.finish() as usize) & self.mask
    }

    fn init_table(&mut self, hint: usize) -> Result<()> {
        let mut size = MIN_TABLE_SIZE;
        while size < hint {
            size <<= 1;
        }
        self.table.set_size(size, &NIL)?;
        self.table.as_mut_slice().fill(NIL);
        self.mask = size - 1;
        self.threshold = size * LOAD_FACTOR_PERCENT / 100;
        log::trace!("hash table initialized with {} buckets", size);
        Ok(())
    }

    /// Double the table and rechain every node. Walking the navigation
    /// list oldest first leaves each bucket chain newest first.
    fn grow_table(&mut self) -> Result<()> {
        let new_size = self.table.len() * 2;
        self.table.set_size(new_size, &NIL)?;
        self.table.as_mut_slice().fill(NIL);
        self.mask = new_size - 1;
        self.threshold = new_size * LOAD_FACTOR_PERCENT / 100;
        log::debug!(
            "hash table grew to {} buckets for {} entries",
            new_size,
            self.nav.len()
        );

        let mut idx = self.nav.first();
        while idx != NIL {
            let bucket = {
                // SAFETY: navigation list indices are live pool slots.
                let node = unsafe { self.pool.get(idx) };
                self.bucket_of(&node.key)
            };
            let next = link_next(&self.pool, idx);
            let head = self.table[bucket];
            // SAFETY: idx is a live node.
            unsafe { self.pool.get_mut(idx) }.hash_next = head;
            self.table[bucket] = idx;
            idx = next;
        }
        Ok(())
    }

    /// Insert `key` with `value`, replacing any entry whose key compares
    /// equal. A replacement swaps in the new key as well, since policy
    /// equality can be coarser than identity.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        if self.table.is_empty() {
            self.init_table(self.table_size_hint)?;
        }

        let mut bucket = self.bucket_of(&key);

        let mut node = self.table[bucket];
        while node != NIL {
            let matched = {
                // SAFETY: collision chain indices are live pool slots.
                let n = unsafe { self.pool.get(node) };
                KP::compare(&key, &n.key) == Ordering::Equal
            };
            if matched {
                // SAFETY: `node` is live; the reads move both fields out
                // and the writes refill them before anything can observe
                // the node again.
                let n = unsafe { self.pool.get_mut(node) };
                unsafe {
                    let old_key = ptr::read(&n.key);
                    let old_value = ptr::read(&n.value);
                    KP::on_remove(old_key);
                    VP::on_remove(old_value);
                    ptr::write(&mut n.value, VP::on_add(value));
                    ptr::write(&mut n.key, KP::on_add(key));
                }
                return Ok(());
            }
            // SAFETY: `node` is live.
            node = unsafe { self.pool.get(node) }.hash_next;
        }

        // Growth happens before the node exists, so a failed allocation
        // leaves the map untouched.
        if self.nav.len() + 1 > self.threshold {
            self.grow_table()?;
            bucket = self.bucket_of(&key);
        }

        let new = self.pool.alloc(HashNode {
            key,
            value,
            hash_next: NIL,
            links: ListLinks::default(),
        })?;

        // The add hooks run only once the allocation has succeeded, so a
        // failed insert never leaves hooked values behind.
        {
            // SAFETY: `new` is live; each field is read out and immediately
            // rewritten with the hooked value.
            let n = unsafe { self.pool.get_mut(new) };
            unsafe {
                let value = ptr::read(&n.value);
                ptr::write(&mut n.value, VP::on_add(value));
                let key = ptr::read(&n.key);
                ptr::write(&mut n.key, KP::on_add(key));
            }
        }

        let head = self.table[bucket];
        // SAFETY: `new` is live.
        unsafe { self.pool.get_mut(new) }.hash_next = head;
        self.table[bucket] = new;
        self.nav.push_back(&mut self.pool, new);
        Ok(())
    }

    fn find_node(&self, key: &K) -> u32 {
        if self.nav.is_empty() {
            return NIL;
        }
        let bucket = self.bucket_of(key);
        let mut node = self.table[bucket];
        while node != NIL {
            // SAFETY: collision chain indices are live pool slots.
            let n = unsafe { self.pool.get(node) };
            if KP::compare(key, &n.key) == Ordering::Equal {
                return node;
            }
            node = n.hash_next;
        }
        NIL
    }

    /// Borrow the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let node = self.find_node(key);
        if node == NIL {
            None
        } else {
            // SAFETY: find_node returned a live node.
            Some(&unsafe { self.pool.get(node) }.value)
        }
    }

    /// Mutably borrow the value stored under `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let node = self.find_node(key);
        if node == NIL {
            None
        } else {
            // SAFETY: find_node returned a live node.
            Some(&mut unsafe { self.pool.get_mut(node) }.value)
        }
    }

    /// Check whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_node(key) != NIL
    }

    /// Remove the entry for `key`, destroying it. Returns false on a miss.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.unlink(key) {
            Some((key, value)) => {
                KP::on_remove(key);
                VP::on_remove(value);
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `key` and hand its value back.
    pub fn detach(&mut self, key: &K) -> Option<V> {
        self.unlink(key).map(|(key, value)| {
            KP::on_remove(key);
            VP::on_detach(value)
        })
    }

    /// Unlink the entry for `key` from its collision chain and the
    /// navigation list and return its payload with no hooks run.
    fn unlink(&mut self, key: &K) -> Option<(K, V)> {
        if self.nav.is_empty() {
            return None;
        }
        let bucket = self.bucket_of(key);

        let mut node = self.table[bucket];
        let mut prev = NIL;
        while node != NIL {
            let (matched, hash_next) = {
                // SAFETY: collision chain indices are live pool slots.
                let n = unsafe { self.pool.get(node) };
                (KP::compare(key, &n.key) == Ordering::Equal, n.hash_next)
            };
            if matched {
                if prev != NIL {
                    // SAFETY: `prev` is a live chain node.
                    unsafe { self.pool.get_mut(prev) }.hash_next = hash_next;
                } else {
                    self.table[bucket] = hash_next;
                }
                self.nav.remove(&mut self.pool, node);
                // SAFETY: `node` is unlinked from chain and list.
                let n = unsafe { self.pool.free(node) };
                return Some((n.key, n.value));
            }
            prev = node;
            node = hash_next;
        }
        None
    }

    /// Entry at position `pos` in insertion order.
    ///
    /// Sequential positions reuse the navigation list's cached cursor and
    /// cost O(1).
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn get_at(&self, pos: usize) -> (&K, &V) {
        let idx = self.nav.get_at(&self.pool, pos);
        // SAFETY: get_at returns a live node.
        let node = unsafe { self.pool.get(idx) };
        (&node.key, &node.value)
    }

    /// Remove every entry, destroying keys and values, and release the
    /// table. The next insert starts from scratch.
    pub fn clear(&mut self) {
        let mut idx = self.nav.first();
        while idx != NIL {
            let next = link_next(&self.pool, idx);
            // SAFETY: idx is a live node of the navigation list.
            let node = unsafe { self.pool.free(idx) };
            KP::on_remove(node.key);
            VP::on_remove(node.value);
            idx = next;
        }
        self.nav.reset();
        self.table = GrowVec::new();
        self.mask = 0;
        self.threshold = 0;
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V, KP, VP> {
        Iter {
            map: self,
            node: self.nav.first(),
        }
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Iterate values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K, V, KP, VP> Default for LinkedHashMap<K, V, KP, VP>
where
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, KP, VP> Drop for LinkedHashMap<K, V, KP, VP>
where
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V, KP, VP> fmt::Debug for LinkedHashMap<K, V, KP, VP>
where
    K: fmt::Debug,
    V: fmt::Debug,
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, KP, VP> PartialEq for LinkedHashMap<K, V, KP, VP>
where
    V: PartialEq,
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    /// Equality ignores insertion order; two maps are equal when they hold
    /// the same keys with equal values.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, KP, VP> Eq for LinkedHashMap<K, V, KP, VP>
where
    V: Eq,
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
}

impl<K, V, KP, VP> Clone for LinkedHashMap<K, V, KP, VP>
where
    K: Clone,
    V: Clone,
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    fn clone(&self) -> Self {
        let mut map = Self::with_table_size(self.table_size_hint);
        for (key, value) in self.iter() {
            map.insert(key.clone(), value.clone()).unwrap();
        }
        map
    }
}

/// Insertion-order iterator over a [`LinkedHashMap`].
pub struct Iter<'a, K, V, KP, VP>
where
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    map: &'a LinkedHashMap<K, V, KP, VP>,
    node: u32,
}

impl<'a, K, V, KP, VP> Iterator for Iter<'a, K, V, KP, VP>
where
    KP: KeyPolicy<K>,
    VP: Policy<V>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        if self.node == NIL {
            return None;
        }
        // SAFETY: the iterator only walks live nodes.
        let node = unsafe { self.map.pool.get(self.node) };
        self.node = node.links.next;
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CaseInsensitive;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[test]
    fn test_insert_get() {
        let mut map: LinkedHashMap<String, i32> = LinkedHashMap::new();
        assert!(map.is_empty());
        assert_eq!(map.get(&"missing".to_string()), None);

        map.insert("one".to_string(), 1).unwrap();
        map.insert("two".to_string(), 2).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"one".to_string()), Some(&1));
        assert_eq!(map.get(&"two".to_string()), Some(&2));
        assert!(map.contains_key(&"one".to_string()));
        assert!(!map.contains_key(&"three".to_string()));
    }

    #[test]
    fn test_lazy_table() {
        let mut map: LinkedHashMap<i32, i32> = LinkedHashMap::new();
        assert_eq!(map.table_size(), 0);
        // Lookups and removals on the never-inserted map stay inert.
        assert_eq!(map.get(&1), None);
        assert!(!map.remove(&1));
        assert_eq!(map.detach(&1), None);

        map.insert(1, 1).unwrap();
        assert_eq!(map.table_size(), MIN_TABLE_SIZE);
    }

    #[test]
    fn test_table_size_rounds_up() {
        let mut map: LinkedHashMap<i32, i32> = LinkedHashMap::with_table_size(200);
        map.insert(1, 1).unwrap();
        assert_eq!(map.table_size(), 256);
        assert_eq!(map.threshold, 256 * 70 / 100);
    }

    #[test]
    fn test_grows_past_load_factor() {
        let mut map: LinkedHashMap<i32, i32> = LinkedHashMap::new();
        for key in 0..44 {
            map.insert(key, key).unwrap();
        }
        // 70% of 64 buckets is 44 entries; the table holds there.
        assert_eq!(map.table_size(), 64);

        map.insert(44, 44).unwrap();
        assert_eq!(map.table_size(), 128);
        assert_eq!(map.threshold, 128 * 70 / 100);

        // Everything survives the rechain.
        for key in 0..45 {
            assert_eq!(map.get(&key), Some(&key));
        }
    }

    #[test]
    fn test_insertion_order_iteration() {
        let mut map: LinkedHashMap<i32, i32> = LinkedHashMap::new();
        let keys = [42, 7, 19, 3, 88, 51];
        for &key in &keys {
            map.insert(key, key * 2).unwrap();
        }

        let seen: Vec<i32> = map.keys().copied().collect();
        assert_eq!(seen, keys);

        for (pos, &key) in keys.iter().enumerate() {
            let (k, v) = map.get_at(pos);
            assert_eq!(*k, key);
            assert_eq!(*v, key * 2);
        }
    }

    #[test]
    fn test_order_survives_growth_and_removal() {
        let mut map: LinkedHashMap<i32, i32> = LinkedHashMap::new();
        for key in 0..100 {
            map.insert(key, key).unwrap();
        }
        map.remove(&0);
        map.remove(&50);
        map.remove(&99);

        let expected: Vec<i32> = (0..100).filter(|k| ![0, 50, 99].contains(k)).collect();
        let seen: Vec<i32> = map.keys().copied().collect();
        assert_eq!(seen, expected);
        assert_eq!(*map.get_at(0).0, 1);
        assert_eq!(*map.get_at(map.len() - 1).0, 98);
    }

    #[test]
    fn test_duplicate_insert_replaces_key_and_value() {
        let mut map: LinkedHashMap<String, i32, CaseInsensitive> = LinkedHashMap::new();
        map.insert("alpha".to_string(), 1).unwrap();
        map.insert("beta".to_string(), 2).unwrap();
        map.insert("ALPHA".to_string(), 3).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"Alpha".to_string()), Some(&3));
        // Replacement keeps the slot's position and swaps in the new
        // spelling of the key.
        let (key, value) = map.get_at(0);
        assert_eq!(key, "ALPHA");
        assert_eq!(*value, 3);
    }

    #[test]
    fn test_remove_and_detach() {
        let mut map: LinkedHashMap<i32, String> = LinkedHashMap::new();
        for key in 0..10 {
            map.insert(key, key.to_string()).unwrap();
        }

        assert!(map.remove(&4));
        assert!(!map.remove(&4));
        assert_eq!(map.detach(&8), Some("8".to_string()));
        assert_eq!(map.detach(&8), None);
        assert_eq!(map.len(), 8);
    }

    /// Hashes every key to the same bucket to force collision chains.
    struct OneBucket;

    impl Policy<i32> for OneBucket {}

    impl ComparePolicy<i32> for OneBucket {
        fn compare(a: &i32, b: &i32) -> Ordering {
            a.cmp(b)
        }
    }

    impl KeyPolicy<i32> for OneBucket {
        fn write_hash<H: Hasher>(_key: &i32, state: &mut H) {
            state.write_u8(0);
        }
    }

    #[test]
    fn test_collision_chain_operations() {
        let mut map: LinkedHashMap<i32, i32, OneBucket> = LinkedHashMap::new();
        for key in 0..10 {
            map.insert(key, key * 10).unwrap();
        }
        for key in 0..10 {
            assert_eq!(map.get(&key), Some(&(key * 10)));
        }

        // Chain head is the newest entry; remove head, middle, and tail.
        assert!(map.remove(&9));
        assert!(map.remove(&5));
        assert!(map.remove(&0));
        assert_eq!(map.len(), 7);
        for key in [1, 2, 3, 4, 6, 7, 8] {
            assert_eq!(map.get(&key), Some(&(key * 10)));
        }
        assert_eq!(map.get(&5), None);

        // Replacement deep in the chain.
        map.insert(1, 100).unwrap();
        assert_eq!(map.get(&1), Some(&100));
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn test_collision_chain_survives_growth() {
        let mut map: LinkedHashMap<i32, i32, OneBucket> = LinkedHashMap::new();
        for key in 0..60 {
            map.insert(key, key).unwrap();
        }
        assert_eq!(map.table_size(), 128);
        for key in 0..60 {
            assert_eq!(map.get(&key), Some(&key));
        }
        let seen: Vec<i32> = map.keys().copied().collect();
        assert_eq!(seen, (0..60).collect::<Vec<_>>());
    }

    thread_local! {
        static EVENTS: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
    }

    struct KeyTrace;
    struct ValueTrace;

    impl Policy<i32> for KeyTrace {
        fn on_add(value: i32) -> i32 {
            EVENTS.with(|e| e.borrow_mut().push("add_key"));
            value
        }
        fn on_remove(value: i32) {
            EVENTS.with(|e| e.borrow_mut().push("remove_key"));
            drop(value);
        }
    }

    impl ComparePolicy<i32> for KeyTrace {
        fn compare(a: &i32, b: &i32) -> Ordering {
            a.cmp(b)
        }
    }

    impl KeyPolicy<i32> for KeyTrace {
        fn write_hash<H: Hasher>(key: &i32, state: &mut H) {
            state.write_i32(*key);
        }
    }

    impl Policy<i32> for ValueTrace {
        fn on_add(value: i32) -> i32 {
            EVENTS.with(|e| e.borrow_mut().push("add_value"));
            value
        }
        fn on_remove(value: i32) {
            EVENTS.with(|e| e.borrow_mut().push("remove_value"));
            drop(value);
        }
        fn on_detach(value: i32) -> i32 {
            EVENTS.with(|e| e.borrow_mut().push("detach_value"));
            value
        }
    }

    #[test]
    fn test_hook_order() {
        EVENTS.with(|e| e.borrow_mut().clear());
        let mut map: LinkedHashMap<i32, i32, KeyTrace, ValueTrace> = LinkedHashMap::new();

        map.insert(1, 10).unwrap();
        EVENTS.with(|e| {
            assert_eq!(*e.borrow(), vec!["add_value", "add_key"]);
            e.borrow_mut().clear();
        });

        map.insert(1, 11).unwrap();
        EVENTS.with(|e| {
            assert_eq!(
                *e.borrow(),
                vec!["remove_key", "remove_value", "add_value", "add_key"]
            );
            e.borrow_mut().clear();
        });

        map.remove(&1);
        EVENTS.with(|e| {
            assert_eq!(*e.borrow(), vec!["remove_key", "remove_value"]);
            e.borrow_mut().clear();
        });

        map.insert(2, 20).unwrap();
        EVENTS.with(|e| e.borrow_mut().clear());
        assert_eq!(map.detach(&2), Some(20));
        EVENTS.with(|e| {
            assert_eq!(*e.borrow(), vec!["remove_key", "detach_value"]);
        });
    }

    #[test]
    fn test_clear_returns_to_lazy_state() {
        let mut map: LinkedHashMap<i32, String> = LinkedHashMap::new();
        for key in 0..50 {
            map.insert(key, key.to_string()).unwrap();
        }
        assert_eq!(map.table_size(), 128);

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.table_size(), 0);
        assert_eq!(map.get(&1), None);

        map.insert(7, "seven".to_string()).unwrap();
        assert_eq!(map.table_size(), MIN_TABLE_SIZE);
        assert_eq!(map.get(&7).map(String::as_str), Some("seven"));
    }

    #[test]
    fn test_clone_and_eq() {
        let mut map: LinkedHashMap<i32, i32> = LinkedHashMap::new();
        for key in 0..20 {
            map.insert(key, key).unwrap();
        }
        let copy = map.clone();
        assert_eq!(map, copy);

        let mut other = copy.clone();
        other.remove(&3);
        assert_ne!(map, other);
    }

    #[test]
    fn test_random_against_model() {
        let mut map: LinkedHashMap<u32, u32> = LinkedHashMap::new();
        let mut model: HashMap<u32, u32> = HashMap::new();
        let mut order: Vec<u32> = Vec::new();
        let mut rng = StdRng::seed_from_u64(0x9e37_79b9);

        for _ in 0..10_000 {
            let key = rng.gen_range(0..300);
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let value = rng.gen::<u32>();
                    map.insert(key, value).unwrap();
                    if model.insert(key, value).is_none() {
                        order.push(key);
                    }
                }
                2 => {
                    let removed = model.remove(&key).is_some();
                    assert_eq!(map.remove(&key), removed);
                    if removed {
                        order.retain(|&k| k != key);
                    }
                }
                _ => {
                    assert_eq!(map.get(&key), model.get(&key));
                }
            }
            assert_eq!(map.len(), model.len());
        }

        // Insertion order held together through every grow and removal.
        let seen: Vec<u32> = map.keys().copied().collect();
        assert_eq!(seen, order);
        for (pos, &key) in order.iter().enumerate() {
            assert_eq!(*map.get_at(pos).0, key);
        }

        for key in order {
            assert_eq!(map.detach(&key), Some(model[&key]));
        }
        assert!(map.is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_get_at_empty() {
        let map: LinkedHashMap<i32, i32> = LinkedHashMap::new();
        let _ = map.get_at(0);
    }
}
