use crate::error::LoadError;
use crate::shared::CacheShared;
use crate::store::{ConcurrentStore, ShardedStore};

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// The contract shared by every cache engine.
///
/// Both [`Cache`] and [`ConcurrentCache`] implement it, and
/// [`CacheBuilder::build_dyn`](crate::CacheBuilder::build_dyn) returns it as
/// a trait object so callers can pick the engine from configuration.
pub trait LoadingCache<K, V>: Send + Sync {
  /// Returns the value for `key`, loading it on first access.
  ///
  /// - A fresh entry is returned without calling the loader.
  /// - A missing key is loaded on the calling thread. Concurrent callers for
  ///   the same key wait for that one load instead of starting their own.
  /// - A stale entry is reloaded inline (synchronous refresh, errors are
  ///   returned) or returned as-is while a background task reloads it
  ///   (asynchronous refresh, errors are logged).
  fn get(&self, key: &K) -> Result<Arc<V>, LoadError>;

  /// Number of live entries, stale ones included.
  fn size(&self) -> usize;

  /// Removes `key`. Returns `true` if it was present.
  fn invalidate(&self, key: &K) -> bool;

  /// Removes every entry. Loads already in flight may repopulate the cache.
  fn clear(&self);

  /// Releases the cache's entries and stops it from loading again. Every
  /// later `get` fails with `LoadError::Destroyed`.
  fn destroy(&self);

  fn name(&self) -> &str;
}

/// A loading cache on the sharded `RwLock<HashMap>` engine.
///
/// Cloning is cheap and every clone refers to the same entries.
pub struct Cache<K, V> {
  pub(crate) shared: Arc<CacheShared<K, V, ShardedStore<K, V>>>,
}

/// A loading cache on the `DashMap` engine. Same contract as [`Cache`].
pub struct ConcurrentCache<K, V> {
  pub(crate) shared: Arc<CacheShared<K, V, ConcurrentStore<K, V>>>,
}

macro_rules! cache_handle {
  ($handle:ident) => {
    impl<K, V> $handle<K, V>
    where
      K: Eq + Hash + Clone + Send + Sync + 'static,
      V: Send + Sync + 'static,
    {
      /// See [`LoadingCache::get`].
      pub fn get(&self, key: &K) -> Result<Arc<V>, LoadError> {
        CacheShared::get(&self.shared, key)
      }

      pub fn size(&self) -> usize {
        self.shared.size()
      }

      pub fn invalidate(&self, key: &K) -> bool {
        self.shared.invalidate(key)
      }

      pub fn clear(&self) {
        self.shared.clear()
      }

      pub fn destroy(&self) {
        self.shared.destroy()
      }

      pub fn is_destroyed(&self) -> bool {
        self.shared.is_destroyed()
      }

      pub fn name(&self) -> &str {
        &self.shared.name
      }
    }

    impl<K, V> LoadingCache<K, V> for $handle<K, V>
    where
      K: Eq + Hash + Clone + Send + Sync + 'static,
      V: Send + Sync + 'static,
    {
      fn get(&self, key: &K) -> Result<Arc<V>, LoadError> {
        $handle::get(self, key)
      }

      fn size(&self) -> usize {
        $handle::size(self)
      }

      fn invalidate(&self, key: &K) -> bool {
        $handle::invalidate(self, key)
      }

      fn clear(&self) {
        $handle::clear(self)
      }

      fn destroy(&self) {
        $handle::destroy(self)
      }

      fn name(&self) -> &str {
        $handle::name(self)
      }
    }

    impl<K, V> Clone for $handle<K, V> {
      fn clone(&self) -> Self {
        Self {
          shared: Arc::clone(&self.shared),
        }
      }
    }

    impl<K, V> fmt::Debug for $handle<K, V> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!($handle))
          .field("shared", &self.shared)
          .finish()
      }
    }
  };
}

cache_handle!(Cache);
cache_handle!(ConcurrentCache);
