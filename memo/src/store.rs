use crate::entry::CacheEntry;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use dashmap::DashMap;
use parking_lot::RwLock;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// The key-to-entry mapping underneath a cache. Pure storage, no policy.
///
/// Structural changes are serialized by the caller (see `CacheShared`), so
/// implementations only need to be safe for concurrent lookups racing with
/// one writer at a time.
pub(crate) trait EntryStore<K, V>: Send + Sync {
  fn lookup(&self, key: &K) -> Option<Arc<CacheEntry<V>>>;

  /// Inserts or replaces the entry for `key`, returning the previous one.
  fn insert(&self, key: K, entry: Arc<CacheEntry<V>>) -> Option<Arc<CacheEntry<V>>>;

  fn remove(&self, key: &K) -> Option<Arc<CacheEntry<V>>>;

  fn len(&self) -> usize;

  fn clear_all(&self);
}

type Shard<K, V, H> = CachePadded<RwLock<HashMap<K, Arc<CacheEntry<V>>, H>>>;

/// A cache store that is partitioned into multiple, independently locked shards.
///
/// This design allows for high concurrency by ensuring that operations on
/// different keys are unlikely to contend for the same lock.
pub(crate) struct ShardedStore<K, V, H = ahash::RandomState> {
  shards: Box<[Shard<K, V, H>]>,
  hasher: H,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a new `ShardedStore`. `num_shards` must be a power of two.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    debug_assert!(num_shards.is_power_of_two());
    let shards = (0..num_shards)
      .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>();

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  fn shard(&self, key: &K) -> &RwLock<HashMap<K, Arc<CacheEntry<V>>, H>> {
    let index = hash_key(&self.hasher, key) as usize & (self.shards.len() - 1);
    &self.shards[index]
  }
}

impl<K, V, H> EntryStore<K, V> for ShardedStore<K, V, H>
where
  K: Eq + Hash + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Clone + Send + Sync,
{
  fn lookup(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
    self.shard(key).read().get(key).cloned()
  }

  fn insert(&self, key: K, entry: Arc<CacheEntry<V>>) -> Option<Arc<CacheEntry<V>>> {
    self.shard(&key).write().insert(key, entry)
  }

  fn remove(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
    self.shard(key).write().remove(key)
  }

  fn len(&self) -> usize {
    self.shards.iter().map(|shard| shard.read().len()).sum()
  }

  fn clear_all(&self) {
    for shard in self.shards.iter() {
      shard.write().clear();
    }
  }
}

/// A store backed by `DashMap`, the engine behind `ConcurrentCache`.
pub(crate) struct ConcurrentStore<K, V, H = ahash::RandomState> {
  map: DashMap<K, Arc<CacheEntry<V>>, H>,
}

impl<K, V, H> fmt::Debug for ConcurrentStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConcurrentStore")
      .field("len", &self.map.len())
      .finish()
  }
}

impl<K, V, H> ConcurrentStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    Self {
      map: DashMap::with_capacity_and_hasher_and_shard_amount(0, hasher, num_shards.max(2)),
    }
  }
}

impl<K, V, H> EntryStore<K, V> for ConcurrentStore<K, V, H>
where
  K: Eq + Hash + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Clone + Send + Sync,
{
  fn lookup(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
    self.map.get(key).map(|entry| entry.value().clone())
  }

  fn insert(&self, key: K, entry: Arc<CacheEntry<V>>) -> Option<Arc<CacheEntry<V>>> {
    self.map.insert(key, entry)
  }

  fn remove(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
    self.map.remove(key).map(|(_, entry)| entry)
  }

  fn len(&self) -> usize {
    self.map.len()
  }

  fn clear_all(&self) {
    self.map.clear();
  }
}
