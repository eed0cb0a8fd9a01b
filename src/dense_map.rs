use std::hash::{BuildHasher, Hash, Hasher};

use fxhash::FxBuildHasher;

const NULL_INDEX: usize = usize::MAX;

/// Maximum load factor before the bucket array is rebuilt.
const LOAD_FACTOR: f32 = 0.707;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    /// Index of the next node sharing the same bucket, or `NULL_INDEX`.
    next: usize,
}

/// Order-preserving hash map with packed values.
///
/// All nodes live in one contiguous array; buckets store the index of the
/// head of a chain threaded through the nodes by index. Iteration order is
/// insertion order, modified by swap-removals. Erasure never shifts nodes:
/// the packed tail is moved into the freed slot and its chain is re-linked.
///
/// Used to key component pools by type hash and to back the signal
/// listener registry, both of which want cheap ordered iteration far more
/// often than they mutate.
#[derive(Debug)]
pub struct DenseMap<K, V, S = FxBuildHasher> {
    buckets: Vec<usize>,
    nodes: Vec<Node<K, V>>,
    hasher: S,
}

impl<K, V, S: Default> Default for DenseMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V> DenseMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V, S> DenseMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        DenseMap {
            buckets: Vec::new(),
            nodes: Vec::new(),
            hasher,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.nodes.reserve(additional);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.nodes.iter().map(|n| (&n.key, &n.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.nodes.iter_mut().map(|n| (&n.key, &mut n.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.nodes.iter().map(|n| &n.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.nodes.iter().map(|n| &n.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.nodes.iter_mut().map(|n| &mut n.value)
    }

    /// Key and value of the node at packed position `index`.
    pub fn entry_at(&self, index: usize) -> (&K, &V) {
        let node = &self.nodes[index];
        (&node.key, &node.value)
    }

    pub fn value_at_mut(&mut self, index: usize) -> &mut V {
        &mut self.nodes[index].value
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = NULL_INDEX;
        }
        self.nodes.clear();
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> DenseMap<K, V, S> {
    fn hash_key(&self, key: &K) -> usize {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        hasher.finish() as usize
    }

    fn bucket_of(&self, key: &K) -> usize {
        debug_assert!(!self.buckets.is_empty());
        self.hash_key(key) % self.buckets.len()
    }

    fn find_index(&self, key: &K) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut index = self.buckets[self.bucket_of(key)];
        while index != NULL_INDEX {
            if self.nodes[index].key == *key {
                return Some(index);
            }
            index = self.nodes[index].next;
        }
        None
    }

    /// Index of the node preceding `index` in its chain, or `index` itself
    /// when the node is the chain head.
    fn chain_prev(&self, index: usize) -> usize {
        let bucket = self.bucket_of(&self.nodes[index].key);
        let mut prev = self.buckets[bucket];
        if prev == index {
            return index;
        }
        while self.nodes[prev].next != index {
            prev = self.nodes[prev].next;
            debug_assert!(prev != NULL_INDEX);
        }
        prev
    }

    /// Appends the node at `index` to the tail of its chain. The node's
    /// `next` must already be `NULL_INDEX`.
    fn link(&mut self, index: usize) {
        let bucket = self.bucket_of(&self.nodes[index].key);
        let mut tail = self.buckets[bucket];
        if tail == NULL_INDEX {
            self.buckets[bucket] = index;
            return;
        }
        while self.nodes[tail].next != NULL_INDEX {
            tail = self.nodes[tail].next;
        }
        self.nodes[tail].next = index;
    }

    /// Removes the node at `index` from its chain without touching the
    /// packed array.
    fn unlink(&mut self, index: usize) {
        let prev = self.chain_prev(index);
        let next = self.nodes[index].next;
        if prev == index {
            let bucket = self.bucket_of(&self.nodes[index].key);
            self.buckets[bucket] = next;
        } else {
            self.nodes[prev].next = next;
        }
        self.nodes[index].next = NULL_INDEX;
    }

    fn rebuild_buckets(&mut self) {
        let count = (self.nodes.len() * 2) as f32 / LOAD_FACTOR;
        self.buckets.clear();
        self.buckets.resize(count as usize, NULL_INDEX);
        for index in 0..self.nodes.len() {
            self.nodes[index].next = NULL_INDEX;
        }
        for index in 0..self.nodes.len() {
            self.link(index);
        }
    }

    /// Grows the bucket array when the load factor is exceeded. Returns
    /// true when no rebuild happened and the caller still has to link the
    /// freshly pushed node.
    fn rehash_if_needed(&mut self) -> bool {
        if (self.nodes.len() as f32) < self.buckets.len() as f32 * LOAD_FACTOR {
            return true;
        }
        self.rebuild_buckets();
        false
    }

    /// Inserts `value` under `key`, returning the previous value if the key
    /// was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(index) = self.find_index(&key) {
            return Some(std::mem::replace(&mut self.nodes[index].value, value));
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            next: NULL_INDEX,
        });
        if self.rehash_if_needed() {
            self.link(index);
        }
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_index(key).map(move |i| &self.nodes[i].value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.find_index(key) {
            Some(i) => Some(&mut self.nodes[i].value),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_index(key).is_some()
    }

    /// Default-inserting lookup: the map equivalent of `operator[]`.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let index = match self.find_index(&key) {
            Some(i) => i,
            None => {
                let index = self.nodes.len();
                self.nodes.push(Node {
                    key,
                    value: default(),
                    next: NULL_INDEX,
                });
                if self.rehash_if_needed() {
                    self.link(index);
                }
                index
            }
        };
        &mut self.nodes[index].value
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.find_index(key).map(move |i| self.remove_at(i).1)
    }

    /// Swap-only erase by packed position: the tail node is moved into the
    /// freed slot and its chain is re-pointed first, so every other index
    /// stays valid.
    pub fn remove_at(&mut self, index: usize) -> (K, V) {
        assert!(index < self.nodes.len());
        self.unlink(index);
        let last = self.nodes.len() - 1;
        if index != last {
            let prev = self.chain_prev(last);
            if prev == last {
                let bucket = self.bucket_of(&self.nodes[last].key);
                self.buckets[bucket] = index;
            } else {
                self.nodes[prev].next = index;
            }
        }
        let node = self.nodes.swap_remove(index);
        (node.key, node.value)
    }
}
