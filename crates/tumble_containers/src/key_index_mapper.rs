//! Map for keeping track of which [`HashMap`] key corresponds to which index
//! in an underlying [`Vec`].

use hashbrown::{HashMap, hash_map::Entry};
use rustc_hash::FxBuildHasher;
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};

/// Map for keeping track of which [`HashMap`] key corresponds to which index
/// in an underlying [`Vec`].
///
/// This is useful if we want the flexibility of accessing data with a key but
/// don't want to sacrifice the compact data storage provided by a `Vec`. It
/// also enables us to reorder items in the `Vec` (like doing a swap remove)
/// without invalidating the keys used to access the items.
#[derive(Clone)]
pub struct KeyIndexMapper<K, S = FxBuildHasher> {
    indices_for_keys: HashMap<K, usize, S>,
    keys_at_indices: Vec<K>,
}

impl<K, S> Debug for KeyIndexMapper<K, S>
where
    K: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIndexMapper")
            .field("indices_for_keys", &self.indices_for_keys)
            .field("keys_at_indices", &self.keys_at_indices)
            .finish()
    }
}

impl<K> KeyIndexMapper<K, FxBuildHasher>
where
    K: Copy + Hash + Eq + Debug,
{
    /// Creates a new mapper with no keys.
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }

    /// Creates a new mapper with at least the specified capacity and no keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices_for_keys: HashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            keys_at_indices: Vec::with_capacity(capacity),
        }
    }
}

impl<K, S> KeyIndexMapper<K, S>
where
    K: Copy + Hash + Eq + Debug,
    S: BuildHasher + Default,
{
    /// Creates a new mapper with no keys, using the given hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            indices_for_keys: HashMap::with_hasher(hasher),
            keys_at_indices: Vec::new(),
        }
    }

    /// The number of keys in the mapper.
    pub fn len(&self) -> usize {
        self.keys_at_indices.len()
    }

    /// Whether the mapper has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys_at_indices.is_empty()
    }

    /// Whether an entry for the given key exists.
    pub fn contains_key(&self, key: K) -> bool {
        self.indices_for_keys.contains_key(&key)
    }

    /// Returns the index corresponding to the given key, or [`None`] if the
    /// key is not present.
    pub fn get(&self, key: K) -> Option<usize> {
        self.indices_for_keys.get(&key).copied()
    }

    /// Returns the index corresponding to the given key.
    ///
    /// # Panics
    /// If the key is not present.
    pub fn idx(&self, key: K) -> usize {
        self.indices_for_keys[&key]
    }

    /// Returns the key corresponding to the given index.
    ///
    /// # Panics
    /// If the index is outside the bounds of the underlying [`Vec`].
    pub fn key_at_idx(&self, idx: usize) -> K {
        self.keys_at_indices[idx]
    }

    /// Returns an iterator over the keys in the order of their indices.
    pub fn key_at_each_idx(&self) -> impl Iterator<Item = K> + '_ {
        self.keys_at_indices.iter().copied()
    }

    /// Adds the given key to the mapper, assigning it the next index.
    ///
    /// # Panics
    /// If the key already exists.
    pub fn push_key(&mut self, key: K) {
        let idx = self.keys_at_indices.len();
        match self.indices_for_keys.entry(key) {
            Entry::Occupied(_) => panic!("Tried to add an existing key: {key:?}"),
            Entry::Vacant(entry) => {
                entry.insert(idx);
            }
        }
        self.keys_at_indices.push(key);
    }

    /// Removes the given key from the mapper, putting the key at the last
    /// index in its place (as done in a swap remove).
    ///
    /// # Returns
    /// The index that the removed key corresponded to.
    ///
    /// # Panics
    /// If the key does not exist.
    pub fn swap_remove_key(&mut self, key: K) -> usize {
        let idx = self
            .indices_for_keys
            .remove(&key)
            .unwrap_or_else(|| panic!("Tried to remove an absent key: {key:?}"));
        self.swap_remove_idx_after_key_removal(idx);
        idx
    }

    /// Removes the given key from the mapper if it exists, putting the key at
    /// the last index in its place (as done in a swap remove).
    ///
    /// # Returns
    /// The index that the removed key corresponded to, or [`None`] if the key
    /// was not present.
    pub fn try_swap_remove_key(&mut self, key: K) -> Option<usize> {
        let idx = self.indices_for_keys.remove(&key)?;
        self.swap_remove_idx_after_key_removal(idx);
        Some(idx)
    }

    /// Removes all keys from the mapper.
    pub fn clear(&mut self) {
        self.indices_for_keys.clear();
        self.keys_at_indices.clear();
    }

    fn swap_remove_idx_after_key_removal(&mut self, idx: usize) {
        self.keys_at_indices.swap_remove(idx);
        if idx < self.keys_at_indices.len() {
            let moved_key = self.keys_at_indices[idx];
            *self
                .indices_for_keys
                .get_mut(&moved_key)
                .expect("Missing index entry for moved key") = idx;
        }
    }
}

impl<K> Default for KeyIndexMapper<K, FxBuildHasher>
where
    K: Copy + Hash + Eq + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
