//! OrderedMap: pooled red-black tree map threaded with an in-order chain
//!
//! Every node carries tree links (parent, left, right) and chain links
//! (prev, next) at once, so ordered iteration never walks the tree and
//! positional access can ride a cached cursor along the chain. All nodes
//! share a single black sentinel leaf; rotations save and restore the
//! sentinel's parent so deletion can temporarily hang fixup state off it.
//!
//! Keys are unique under the key policy's ordering. Inserting an existing
//! key replaces both the stored key and the value, since policy equality
//! can be coarser than identity (case insensitive strings compare equal
//! without being the same string).

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use crate::error::{PlinthError, Result};
use crate::memory::{BlockPool, NIL};
use crate::policy::{ComparePolicy, Policy, Value};

/// Index of the shared sentinel leaf. Distinct from [`NIL`], which marks
/// chain ends and an unset cursor.
const LEAF: u32 = u32::MAX - 1;

struct TreeLinks {
    parent: u32,
    left: u32,
    right: u32,
    prev: u32,
    next: u32,
}

struct TreeNode<K, V> {
    links: TreeLinks,
    red: bool,
    key: K,
    value: V,
}

/// Ordered map over pooled nodes with O(1) sequential positional access.
///
/// # Examples
///
/// ```rust
/// use plinth::OrderedMap;
///
/// let mut map: OrderedMap<i32, &str> = OrderedMap::new();
/// map.insert(2, "two")?;
/// map.insert(1, "one")?;
/// map.insert(3, "three")?;
///
/// assert_eq!(map.get(&2), Some(&"two"));
/// let (key, value) = map.get_at(0);
/// assert_eq!((*key, *value), (1, "one"));
/// # Ok::<(), plinth::PlinthError>(())
/// ```
pub struct OrderedMap<K, V, KP = Value, VP = Value>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    pool: BlockPool<TreeNode<K, V>>,
    root: u32,
    first: u32,
    last: u32,
    leaf: TreeLinks,
    len: usize,
    iter_node: Cell<u32>,
    iter_pos: Cell<usize>,
    _policies: PhantomData<(KP, VP)>,
}

impl<K, V, KP, VP> OrderedMap<K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            pool: BlockPool::new(),
            root: LEAF,
            first: NIL,
            last: NIL,
            leaf: TreeLinks {
                parent: NIL,
                left: LEAF,
                right: LEAF,
                prev: NIL,
                next: NIL,
            },
            len: 0,
            iter_node: Cell::new(NIL),
            iter_pos: Cell::new(0),
            _policies: PhantomData,
        }
    }

    /// Create a map whose node pool uses `block_size` slots per block.
    pub fn with_block_size(block_size: usize) -> Self {
        let mut map = Self::new();
        map.pool = BlockPool::with_block_size(block_size);
        map
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Link accessors. The sentinel's links live outside the pool, so every
    // read and write branches on LEAF.

    #[inline]
    fn parent(&self, idx: u32) -> u32 {
        if idx == LEAF {
            self.leaf.parent
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get(idx) }.links.parent
        }
    }

    #[inline]
    fn left(&self, idx: u32) -> u32 {
        if idx == LEAF {
            self.leaf.left
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get(idx) }.links.left
        }
    }

    #[inline]
    fn right(&self, idx: u32) -> u32 {
        if idx == LEAF {
            self.leaf.right
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get(idx) }.links.right
        }
    }

    /// The sentinel is always black.
    #[inline]
    fn is_red(&self, idx: u32) -> bool {
        if idx == LEAF {
            false
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get(idx) }.red
        }
    }

    #[inline]
    fn set_parent(&mut self, idx: u32, parent: u32) {
        if idx == LEAF {
            self.leaf.parent = parent;
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get_mut(idx) }.links.parent = parent;
        }
    }

    #[inline]
    fn set_left(&mut self, idx: u32, left: u32) {
        if idx == LEAF {
            self.leaf.left = left;
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get_mut(idx) }.links.left = left;
        }
    }

    #[inline]
    fn set_right(&mut self, idx: u32, right: u32) {
        if idx == LEAF {
            self.leaf.right = right;
        } else {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get_mut(idx) }.links.right = right;
        }
    }

    #[inline]
    fn set_red(&mut self, idx: u32, red: bool) {
        if idx != LEAF {
            // SAFETY: tree indices always refer to live pool slots.
            unsafe { self.pool.get_mut(idx) }.red = red;
        }
    }

    // Chain accessors. The chain only ever holds real nodes.

    #[inline]
    fn chain_next(&self, idx: u32) -> u32 {
        // SAFETY: chain indices always refer to live pool slots.
        unsafe { self.pool.get(idx) }.links.next
    }

    #[inline]
    fn chain_prev(&self, idx: u32) -> u32 {
        // SAFETY: chain indices always refer to live pool slots.
        unsafe { self.pool.get(idx) }.links.prev
    }

    #[inline]
    fn set_chain_next(&mut self, idx: u32, next: u32) {
        // SAFETY: chain indices always refer to live pool slots.
        unsafe { self.pool.get_mut(idx) }.links.next = next;
    }

    #[inline]
    fn set_chain_prev(&mut self, idx: u32, prev: u32) {
        // SAFETY: chain indices always refer to live pool slots.
        unsafe { self.pool.get_mut(idx) }.links.prev = prev;
    }

    #[inline]
    fn pair(&self, idx: u32) -> (&K, &V) {
        // SAFETY: callers pass live node indices.
        let node = unsafe { self.pool.get(idx) };
        (&node.key, &node.value)
    }

    fn find_node(&self, key: &K) -> u32 {
        let mut node = self.root;
        while node != LEAF {
            // SAFETY: the descent only visits live nodes.
            let n = unsafe { self.pool.get(node) };
            match KP::compare(key, &n.key) {
                Ordering::Less => node = n.links.left,
                Ordering::Greater => node = n.links.right,
                Ordering::Equal => return node,
            }
        }
        NIL
    }

    /// Leftmost node of the subtree rooted at `node`.
    fn subtree_min(&self, mut node: u32) -> u32 {
        while self.left(node) != LEAF {
            node = self.left(node);
        }
        node
    }

    fn rotate_left(&mut self, x: u32) {
        // The sentinel's parent doubles as fixup scratch, keep it intact.
        let saved = self.leaf.parent;
        let y = self.right(x);

        let y_left = self.left(y);
        self.set_right(x, y_left);
        self.set_parent(y_left, x);

        let x_parent = self.parent(x);
        self.set_parent(y, x_parent);

        if x != self.root {
            if self.left(x_parent) == x {
                self.set_left(x_parent, y);
            } else {
                self.set_right(x_parent, y);
            }
        } else {
            self.root = y;
        }

        self.set_left(y, x);
        self.set_parent(x, y);
        self.leaf.parent = saved;
    }

    fn rotate_right(&mut self, y: u32) {
        let saved = self.leaf.parent;
        let x = self.left(y);

        let x_right = self.right(x);
        self.set_left(y, x_right);
        self.set_parent(x_right, y);

        let y_parent = self.parent(y);
        self.set_parent(x, y_parent);

        if y != self.root {
            if self.left(y_parent) == y {
                self.set_left(y_parent, x);
            } else {
                self.set_right(y_parent, x);
            }
        } else {
            self.root = x;
        }

        self.set_right(x, y);
        self.set_parent(y, x);
        self.leaf.parent = saved;
    }

    /// Insert `key` with `value`, replacing any entry whose key compares
    /// equal. A replacement swaps in the new key as well, since policy
    /// equality can be coarser than identity.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let mut node = self.root;
        let mut parent = NIL;
        let mut went_left = false;

        while node != LEAF {
            parent = node;
            // SAFETY: the descent only visits live nodes.
            let n = unsafe { self.pool.get(node) };
            match KP::compare(&key, &n.key) {
                Ordering::Less => {
                    went_left = true;
                    node = n.links.left;
                }
                Ordering::Greater => {
                    went_left = false;
                    node = n.links.right;
                }
                Ordering::Equal => {
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
            }
        }

        if self.len >= LEAF as usize {
            return Err(PlinthError::capacity_exceeded(LEAF as usize));
        }

        let new = self.pool.alloc(TreeNode {
            links: TreeLinks {
                parent,
                left: LEAF,
                right: LEAF,
                prev: NIL,
                next: NIL,
            },
            red: true,
            key,
            value,
        })?;
        if new >= LEAF {
            // Indices at and above LEAF are reserved link sentinels. The
            // pool can reach this index through block rounding before the
            // length guard trips.
            // SAFETY: `new` is live and not yet reachable from the tree;
            // its key and value drop unhooked, as on any failed insert.
            let _ = unsafe { self.pool.free(new) };
            return Err(PlinthError::capacity_exceeded(LEAF as usize));
        }

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

        if parent != NIL {
            if went_left {
                self.set_left(parent, new);
                let parent_prev = self.chain_prev(parent);
                // SAFETY: `new` is live.
                let n = unsafe { self.pool.get_mut(new) };
                n.links.next = parent;
                n.links.prev = parent_prev;
            } else {
                self.set_right(parent, new);
                let parent_next = self.chain_next(parent);
                // SAFETY: `new` is live.
                let n = unsafe { self.pool.get_mut(new) };
                n.links.prev = parent;
                n.links.next = parent_next;
            }
        } else {
            self.root = new;
        }

        let (new_prev, new_next) = {
            // SAFETY: `new` is live.
            let n = unsafe { self.pool.get(new) };
            (n.links.prev, n.links.next)
        };
        if new_prev != NIL {
            self.set_chain_next(new_prev, new);
        } else {
            self.first = new;
        }
        if new_next != NIL {
            self.set_chain_prev(new_next, new);
        } else {
            self.last = new;
        }

        // A new entry before the positional cursor bumps the cursor node's
        // rank; its predecessor now sits at the cached position. The new
        // node is already chained in, so that predecessor exists.
        if self.iter_node.get() != NIL {
            let cursor = self.iter_node.get();
            let ord = {
                // SAFETY: `new` and the cursor node are live.
                let new_key = &unsafe { self.pool.get(new) }.key;
                let cursor_key = &unsafe { self.pool.get(cursor) }.key;
                KP::compare(new_key, cursor_key)
            };
            if ord == Ordering::Less {
                self.iter_node.set(self.chain_prev(cursor));
            }
        }

        // Rebalance.
        let mut node = new;
        while node != self.root && self.is_red(self.parent(node)) {
            let parent = self.parent(node);
            let grand = self.parent(parent);

            if parent == self.left(grand) {
                let uncle = self.right(grand);
                if self.is_red(uncle) {
                    self.set_red(parent, false);
                    self.set_red(uncle, false);
                    self.set_red(grand, true);
                    node = grand;
                } else {
                    if node == self.right(parent) {
                        node = parent;
                        self.rotate_left(node);
                    }
                    let p = self.parent(node);
                    self.set_red(p, false);
                    let g = self.parent(p);
                    self.set_red(g, true);
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.left(grand);
                if self.is_red(uncle) {
                    self.set_red(parent, false);
                    self.set_red(uncle, false);
                    self.set_red(grand, true);
                    node = grand;
                } else {
                    if node == self.left(parent) {
                        node = parent;
                        self.rotate_right(node);
                    }
                    let p = self.parent(node);
                    self.set_red(p, false);
                    let g = self.parent(p);
                    self.set_red(g, true);
                    self.rotate_left(g);
                }
            }
        }

        let root = self.root;
        self.set_red(root, false);
        self.len += 1;
        Ok(())
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

    /// Unlink the entry for `key` from tree and chain and return its
    /// payload with no hooks run.
    fn unlink(&mut self, key: &K) -> Option<(K, V)> {
        let z = self.find_node(key);
        if z == NIL {
            return None;
        }

        // y is the node that physically leaves the tree: z itself, or its
        // in-order successor when z has two children. x replaces y.
        let y = if self.left(z) == LEAF || self.right(z) == LEAF {
            z
        } else {
            self.subtree_min(self.right(z))
        };
        let x = if self.left(y) != LEAF {
            self.left(y)
        } else {
            self.right(y)
        };

        // x may be the sentinel, the fixup below still needs its parent.
        let y_parent = self.parent(y);
        let y_red = self.is_red(y);
        self.set_parent(x, y_parent);

        if y != self.root {
            if self.left(y_parent) == y {
                self.set_left(y_parent, x);
            } else {
                self.set_right(y_parent, x);
            }
        } else {
            self.root = x;
        }

        // Removing a key at or before the positional cursor drops the rank
        // of everything behind it; the cursor node's successor takes over
        // the cached position. Off the end the cursor just goes invalid.
        if self.iter_node.get() != NIL {
            let cursor = self.iter_node.get();
            // SAFETY: the cursor rests on a live node.
            let ord = KP::compare(key, &unsafe { self.pool.get(cursor) }.key);
            if ord != Ordering::Greater {
                self.iter_node.set(self.chain_next(cursor));
            }
        }

        let payload;
        if y != z {
            // z's slot survives and takes over y's payload; y's node goes
            // back to the pool. y is z's chain successor, so the chain
            // splice is just z.next = y.next.
            let y_next = self.chain_next(y);
            // SAFETY: y is live and already out of the tree; the chain is
            // rerouted around it right below, before anyone can follow it.
            let y_node = unsafe { self.pool.free(y) };
            {
                // SAFETY: z is live.
                let zn = unsafe { self.pool.get_mut(z) };
                payload = (
                    std::mem::replace(&mut zn.key, y_node.key),
                    std::mem::replace(&mut zn.value, y_node.value),
                );
                zn.links.next = y_next;
            }
            if y_next != NIL {
                self.set_chain_prev(y_next, z);
            } else {
                self.last = z;
            }
            if self.iter_node.get() == y {
                self.iter_node.set(z);
            }
        } else {
            let z_prev = self.chain_prev(z);
            let z_next = self.chain_next(z);
            if self.iter_node.get() == z {
                self.iter_node.set(z_next);
            }
            if z_prev != NIL {
                self.set_chain_next(z_prev, z_next);
            } else {
                self.first = z_next;
            }
            if z_next != NIL {
                self.set_chain_prev(z_next, z_prev);
            } else {
                self.last = z_prev;
            }
            // SAFETY: z has been spliced out of tree and chain.
            let z_node = unsafe { self.pool.free(z) };
            payload = (z_node.key, z_node.value);
        }

        // Rebalance, Introduction to Algorithms deletion fixup.
        if !y_red {
            let mut node = x;
            while node != self.root && !self.is_red(node) {
                let parent = self.parent(node);
                if node == self.left(parent) {
                    let mut sibling = self.right(parent);

                    if self.is_red(sibling) {
                        self.set_red(sibling, false);
                        self.set_red(parent, true);
                        self.rotate_left(parent);
                        sibling = self.right(self.parent(node));
                    }

                    let s_left = self.left(sibling);
                    let s_right = self.right(sibling);
                    if !self.is_red(s_left) && !self.is_red(s_right) {
                        self.set_red(sibling, true);
                        node = self.parent(node);
                        continue;
                    } else if !self.is_red(s_right) {
                        self.set_red(s_left, false);
                        self.set_red(sibling, true);
                        self.rotate_right(sibling);
                        sibling = self.right(self.parent(node));
                    }

                    let parent = self.parent(node);
                    let parent_red = self.is_red(parent);
                    self.set_red(sibling, parent_red);
                    self.set_red(parent, false);
                    let s_right = self.right(sibling);
                    self.set_red(s_right, false);
                    self.rotate_left(parent);
                    node = self.root;
                } else {
                    let mut sibling = self.left(parent);

                    if self.is_red(sibling) {
                        self.set_red(sibling, false);
                        self.set_red(parent, true);
                        self.rotate_right(parent);
                        sibling = self.left(self.parent(node));
                    }

                    let s_left = self.left(sibling);
                    let s_right = self.right(sibling);
                    if !self.is_red(s_left) && !self.is_red(s_right) {
                        self.set_red(sibling, true);
                        node = self.parent(node);
                        continue;
                    } else if !self.is_red(s_left) {
                        self.set_red(s_right, false);
                        self.set_red(sibling, true);
                        self.rotate_left(sibling);
                        sibling = self.left(self.parent(node));
                    }

                    let parent = self.parent(node);
                    let parent_red = self.is_red(parent);
                    self.set_red(sibling, parent_red);
                    self.set_red(parent, false);
                    let s_left = self.left(sibling);
                    self.set_red(s_left, false);
                    self.rotate_right(parent);
                    node = self.root;
                }
            }
            self.set_red(node, false);
        }

        self.len -= 1;
        Some(payload)
    }

    /// Entry at rank `pos` in key order.
    ///
    /// Ranks 0 and `len - 1` are O(1) through the chain ends; other ranks
    /// walk from whichever of head, tail, or the cached cursor is closest,
    /// so sequential access is O(1) per call.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn get_at(&self, pos: usize) -> (&K, &V) {
        assert!(
            pos < self.len,
            "position {} out of range for length {}",
            pos,
            self.len
        );

        if pos == 0 {
            self.iter_node.set(self.first);
            self.iter_pos.set(0);
            return self.pair(self.first);
        }
        if pos == self.len - 1 {
            self.iter_node.set(self.last);
            self.iter_pos.set(pos);
            return self.pair(self.last);
        }

        if self.iter_node.get() != NIL {
            let cached = self.iter_pos.get();
            if pos == cached {
                return self.pair(self.iter_node.get());
            }
            if pos == cached + 1 {
                let node = self.chain_next(self.iter_node.get());
                self.iter_node.set(node);
                self.iter_pos.set(pos);
                return self.pair(node);
            }
            if pos + 1 == cached {
                let node = self.chain_prev(self.iter_node.get());
                self.iter_node.set(node);
                self.iter_pos.set(pos);
                return self.pair(node);
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
                    node = self.chain_next(node);
                    at += 1;
                }
                while at > pos {
                    node = self.chain_prev(node);
                    at -= 1;
                }
                self.iter_node.set(node);
                self.iter_pos.set(pos);
                return self.pair(node);
            }
        }

        let node = if from_start < from_end {
            let mut node = self.first;
            for _ in 0..from_start {
                node = self.chain_next(node);
            }
            node
        } else {
            let mut node = self.last;
            for _ in 0..from_end {
                node = self.chain_prev(node);
            }
            node
        };
        self.iter_node.set(node);
        self.iter_pos.set(pos);
        self.pair(node)
    }

    /// Remove every entry, destroying keys and values.
    pub fn clear(&mut self) {
        let root = self.root;
        self.free_subtree(root);
        self.root = LEAF;
        self.first = NIL;
        self.last = NIL;
        self.len = 0;
        self.iter_node.set(NIL);
        self.iter_pos.set(0);
    }

    fn free_subtree(&mut self, node: u32) {
        if node == LEAF {
            return;
        }
        let (left, right) = {
            // SAFETY: the walk only visits live nodes.
            let n = unsafe { self.pool.get(node) };
            (n.links.left, n.links.right)
        };
        self.free_subtree(left);
        self.free_subtree(right);
        // SAFETY: `node` is live and nothing references it after this.
        let n = unsafe { self.pool.free(node) };
        KP::on_remove(n.key);
        VP::on_remove(n.value);
    }

    /// Entry with the smallest key, or `None` when empty. O(1).
    pub fn first(&self) -> Option<(&K, &V)> {
        if self.first == NIL {
            None
        } else {
            Some(self.pair(self.first))
        }
    }

    /// Entry with the largest key, or `None` when empty. O(1).
    pub fn last(&self) -> Option<(&K, &V)> {
        if self.last == NIL {
            None
        } else {
            Some(self.pair(self.last))
        }
    }

    /// Iterate entries in key order. The iterator is double-ended.
    pub fn iter(&self) -> Iter<'_, K, V, KP, VP> {
        Iter {
            map: self,
            front: self.first,
            back: self.last,
            done: self.first == NIL,
        }
    }

    /// Iterate keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Iterate values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K, V, KP, VP> Default for OrderedMap<K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, KP, VP> Drop for OrderedMap<K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V, KP, VP> fmt::Debug for OrderedMap<K, V, KP, VP>
where
    K: fmt::Debug,
    V: fmt::Debug,
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, KP, VP> PartialEq for OrderedMap<K, V, KP, VP>
where
    K: PartialEq,
    V: PartialEq,
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.0 == b.0 && a.1 == b.1)
    }
}

impl<K, V, KP, VP> Eq for OrderedMap<K, V, KP, VP>
where
    K: Eq,
    V: Eq,
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
}

impl<K, V, KP, VP> Clone for OrderedMap<K, V, KP, VP>
where
    K: Clone,
    V: Clone,
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    fn clone(&self) -> Self {
        let mut map = Self::with_block_size(self.pool.block_size());
        for (key, value) in self.iter() {
            map.insert(key.clone(), value.clone()).unwrap();
        }
        map
    }
}

/// In-order iterator over an [`OrderedMap`].
///
/// Walks the entry chain from both ends; `done` flips when the cursors
/// meet so neither end walks past the other.
pub struct Iter<'a, K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    map: &'a OrderedMap<K, V, KP, VP>,
    front: u32,
    back: u32,
    done: bool,
}

impl<'a, K, V, KP, VP> Iterator for Iter<'a, K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        if self.done {
            return None;
        }
        // SAFETY: the iterator only walks live nodes.
        let node = unsafe { self.map.pool.get(self.front) };
        if self.front == self.back {
            self.done = true;
        } else {
            self.front = node.links.next;
        }
        Some((&node.key, &node.value))
    }
}

impl<'a, K, V, KP, VP> DoubleEndedIterator for Iter<'a, K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    fn next_back(&mut self) -> Option<(&'a K, &'a V)> {
        if self.done {
            return None;
        }
        // SAFETY: the iterator only walks live nodes.
        let node = unsafe { self.map.pool.get(self.back) };
        if self.front == self.back {
            self.done = true;
        } else {
            self.back = node.links.prev;
        }
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
impl<K, V, KP, VP> OrderedMap<K, V, KP, VP>
where
    KP: ComparePolicy<K>,
    VP: Policy<V>,
{
    /// Walk the whole structure and panic on any broken invariant.
    fn check_consistency(&self) {
        // Tree walk: parent backpointers, no red-red edges, equal black
        // height on every path, in-order matches the chain.
        let mut in_order = Vec::new();
        let black_height = self.check_subtree(self.root, &mut in_order);
        assert!(black_height >= 0);
        assert!(!self.is_red(self.root), "root must be black");
        assert_eq!(in_order.len(), self.len, "tree size mismatch");

        // Chain walk, forward.
        let mut node = self.first;
        let mut chain = Vec::new();
        let mut prev = NIL;
        while node != NIL {
            assert_eq!(self.chain_prev(node), prev, "broken chain backlink");
            chain.push(node);
            prev = node;
            node = self.chain_next(node);
        }
        assert_eq!(prev, if self.len == 0 { NIL } else { self.last });
        assert_eq!(chain, in_order, "chain order diverges from tree order");

        for pair in chain.windows(2) {
            // SAFETY: chain nodes are live.
            let a = &unsafe { self.pool.get(pair[0]) }.key;
            let b = &unsafe { self.pool.get(pair[1]) }.key;
            assert_eq!(KP::compare(a, b), Ordering::Less, "chain not sorted");
        }

        if self.iter_node.get() != NIL {
            let rank = chain
                .iter()
                .position(|&n| n == self.iter_node.get())
                .expect("cursor points at a node outside the chain");
            assert_eq!(rank, self.iter_pos.get(), "cursor rank out of date");
        }
    }

    fn check_subtree(&self, node: u32, in_order: &mut Vec<u32>) -> i32 {
        if node == LEAF {
            return 1;
        }
        let left = self.left(node);
        let right = self.right(node);
        if left != LEAF {
            assert_eq!(self.parent(left), node, "left child parent mismatch");
        }
        if right != LEAF {
            assert_eq!(self.parent(right), node, "right child parent mismatch");
        }
        if self.is_red(node) {
            assert!(
                !self.is_red(left) && !self.is_red(right),
                "red node with red child"
            );
        }
        let lh = self.check_subtree(left, in_order);
        in_order.push(node);
        let rh = self.check_subtree(right, in_order);
        assert_eq!(lh, rh, "black height differs between subtrees");
        lh + if self.is_red(node) { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CaseInsensitive;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[test]
    fn test_insert_get() {
        let mut map: OrderedMap<i32, String> = OrderedMap::new();
        map.insert(2, "two".to_string()).unwrap();
        map.insert(1, "one".to_string()).unwrap();
        map.insert(3, "three".to_string()).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&1).map(String::as_str), Some("one"));
        assert_eq!(map.get(&2).map(String::as_str), Some("two"));
        assert_eq!(map.get(&4), None);
        assert!(map.contains_key(&3));
        assert!(!map.contains_key(&0));
        map.check_consistency();
    }

    #[test]
    fn test_iteration_sorted() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in [5, 1, 9, 3, 7, 2, 8, 4, 6, 0] {
            map.insert(key, key * 10).unwrap();
        }
        let keys: Vec<i32> = map.keys().copied().collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        let values: Vec<i32> = map.values().copied().collect();
        assert_eq!(values, (0..10).map(|k| k * 10).collect::<Vec<_>>());
        map.check_consistency();
    }

    #[test]
    fn test_first_last() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        assert_eq!(map.first(), None);
        assert_eq!(map.last(), None);

        for key in [5, 1, 9, 3] {
            map.insert(key, key * 10).unwrap();
        }
        assert_eq!(map.first(), Some((&1, &10)));
        assert_eq!(map.last(), Some((&9, &90)));

        assert!(map.remove(&9));
        assert_eq!(map.last(), Some((&5, &50)));
        assert!(map.remove(&1));
        assert_eq!(map.first(), Some((&3, &30)));
    }

    #[test]
    fn test_iter_reversed() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in [4, 2, 7, 1, 9] {
            map.insert(key, key).unwrap();
        }

        let reversed: Vec<i32> = map.iter().rev().map(|(key, _)| *key).collect();
        assert_eq!(reversed, [9, 7, 4, 2, 1]);

        // The two ends meet without overlapping.
        let mut iter = map.iter();
        assert_eq!(iter.next().map(|(key, _)| *key), Some(1));
        assert_eq!(iter.next_back().map(|(key, _)| *key), Some(9));
        assert_eq!(iter.next_back().map(|(key, _)| *key), Some(7));
        assert_eq!(iter.next().map(|(key, _)| *key), Some(2));
        assert_eq!(iter.next().map(|(key, _)| *key), Some(4));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);

        let empty: OrderedMap<i32, i32> = OrderedMap::new();
        assert_eq!(empty.iter().next_back(), None);
    }

    #[test]
    fn test_duplicate_insert_replaces_key_and_value() {
        let mut map: OrderedMap<String, i32, CaseInsensitive> = OrderedMap::new();
        map.insert("alpha".to_string(), 1).unwrap();
        map.insert("ALPHA".to_string(), 2).unwrap();

        assert_eq!(map.len(), 1);
        // The stored key is the most recently inserted spelling.
        let (key, value) = map.get_at(0);
        assert_eq!(key, "ALPHA");
        assert_eq!(*value, 2);
        assert_eq!(map.get(&"Alpha".to_string()), Some(&2));
        map.check_consistency();
    }

    #[test]
    fn test_get_mut() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        map.insert(1, 10).unwrap();
        *map.get_mut(&1).unwrap() = 20;
        assert_eq!(map.get(&1), Some(&20));
        assert_eq!(map.get_mut(&2), None);
    }

    #[test]
    fn test_remove_and_detach() {
        let mut map: OrderedMap<i32, String> = OrderedMap::new();
        for key in 0..10 {
            map.insert(key, key.to_string()).unwrap();
        }

        assert!(map.remove(&3));
        assert!(!map.remove(&3));
        assert_eq!(map.detach(&7), Some("7".to_string()));
        assert_eq!(map.detach(&7), None);
        assert_eq!(map.len(), 8);
        assert_eq!(map.get(&3), None);
        map.check_consistency();
    }

    #[test]
    fn test_remove_node_with_two_children() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in [50, 25, 75, 10, 30, 60, 90, 5, 15, 27, 35] {
            map.insert(key, key).unwrap();
        }
        map.check_consistency();

        // 25 has two children, so its in-order successor is copied down.
        assert!(map.remove(&25));
        map.check_consistency();
        assert_eq!(map.get(&25), None);
        assert_eq!(map.len(), 10);

        assert!(map.remove(&50));
        map.check_consistency();

        let keys: Vec<i32> = map.keys().copied().collect();
        assert_eq!(keys, vec![5, 10, 15, 27, 30, 35, 60, 75, 90]);
    }

    #[test]
    fn test_get_at_ranks() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in [4, 2, 8, 6, 0] {
            map.insert(key, key * 100).unwrap();
        }

        assert_eq!(*map.get_at(0).0, 0);
        assert_eq!(*map.get_at(4).0, 8);
        for pos in 0..5 {
            let (key, value) = map.get_at(pos);
            assert_eq!(*key, (pos as i32) * 2);
            assert_eq!(*value, (pos as i32) * 200);
        }
        for pos in (0..5).rev() {
            assert_eq!(*map.get_at(pos).0, (pos as i32) * 2);
        }
        map.check_consistency();
    }

    #[test]
    fn test_get_at_tracks_edits() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        let mut model: BTreeMap<i32, i32> = BTreeMap::new();
        for key in [10, 20, 30, 40, 50, 60] {
            map.insert(key, key).unwrap();
            model.insert(key, key);
        }

        // Park the cursor mid-map, then insert before and after it.
        assert_eq!(*map.get_at(3).0, 40);
        map.insert(15, 15).unwrap();
        model.insert(15, 15);
        map.insert(55, 55).unwrap();
        model.insert(55, 55);
        for (pos, (&key, &value)) in model.iter().enumerate() {
            assert_eq!(map.get_at(pos), (&key, &value));
        }
        map.check_consistency();

        // Remove behind the cursor, then at the cursor.
        assert_eq!(*map.get_at(4).0, 40);
        map.remove(&10);
        model.remove(&10);
        map.remove(&40);
        model.remove(&40);
        for (pos, (&key, &value)) in model.iter().enumerate() {
            assert_eq!(map.get_at(pos), (&key, &value));
        }
        map.check_consistency();
    }

    #[test]
    fn test_cursor_survives_removing_last() {
        let mut map: OrderedMap<i32, i32> = OrderedMap::new();
        for key in 0..5 {
            map.insert(key, key).unwrap();
        }

        // Cursor on the last entry, then remove it: the cursor runs off the
        // chain and must drop out cleanly.
        assert_eq!(*map.get_at(4).0, 4);
        assert!(map.remove(&4));
        map.check_consistency();
        assert_eq!(*map.get_at(3).0, 3);
        assert_eq!(*map.get_at(1).0, 1);
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut map: OrderedMap<i32, String> = OrderedMap::new();
        for key in 0..20 {
            map.insert(key, key.to_string()).unwrap();
        }
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.get(&5), None);

        map.insert(1, "one".to_string()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1).map(String::as_str), Some("one"));
        map.check_consistency();
    }

    #[test]
    fn test_clone_and_eq() {
        let mut map: OrderedMap<i32, String> = OrderedMap::new();
        for key in 0..10 {
            map.insert(key, key.to_string()).unwrap();
        }
        let copy = map.clone();
        assert_eq!(map, copy);
        copy.check_consistency();

        let mut other = copy.clone();
        other.remove(&0);
        assert_ne!(map, other);
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
        let mut map: OrderedMap<i32, i32, KeyTrace, ValueTrace> = OrderedMap::new();

        map.insert(1, 10).unwrap();
        EVENTS.with(|e| {
            assert_eq!(*e.borrow(), vec!["add_value", "add_key"]);
            e.borrow_mut().clear();
        });

        // Replacing releases the old pair before hooking the new one.
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
    fn test_random_against_model() {
        let mut map: OrderedMap<u32, u32> = OrderedMap::new();
        let mut model: BTreeMap<u32, u32> = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(0x2545_f491);

        for round in 0..10_000 {
            let key = rng.gen_range(0..512);
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let value = rng.gen::<u32>();
                    map.insert(key, value).unwrap();
                    model.insert(key, value);
                }
                2 => {
                    assert_eq!(map.remove(&key), model.remove(&key).is_some());
                }
                _ => {
                    assert_eq!(map.get(&key), model.get(&key));
                    if !model.is_empty() {
                        let pos = rng.gen_range(0..model.len());
                        let (mk, mv) = model.iter().nth(pos).unwrap();
                        assert_eq!(map.get_at(pos), (mk, mv));
                    }
                }
            }
            assert_eq!(map.len(), model.len());
            if round % 1000 == 0 {
                map.check_consistency();
            }
        }
        map.check_consistency();

        for (key, value) in model {
            assert_eq!(map.detach(&key), Some(value));
        }
        assert!(map.is_empty());
        map.check_consistency();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_get_at_empty() {
        let map: OrderedMap<i32, i32> = OrderedMap::new();
        let _ = map.get_at(0);
    }
}
