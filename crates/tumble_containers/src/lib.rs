//! Containers and data structures.

mod key_index_mapper;

pub use key_index_mapper::KeyIndexMapper;

pub use rustc_hash::FxBuildHasher as RandomState;
pub use rustc_hash::FxHasher as DefaultHasher;

pub type HashMap<K, V> = hashbrown::HashMap<K, V, rustc_hash::FxBuildHasher>;
pub type HashSet<T> = hashbrown::HashSet<T, rustc_hash::FxBuildHasher>;

pub type NoHashMap<K, V> = hashbrown::HashMap<K, V, nohash_hasher::BuildNoHashHasher<K>>;
pub type NoHashSet<K> = hashbrown::HashSet<K, nohash_hasher::BuildNoHashHasher<K>>;
