use crate::coordinator::PendingLoads;
use crate::entry::CacheEntry;
use crate::error::LoadError;
use crate::expiry::Expiry;
use crate::loader::{LoadOutcome, Loader};
use crate::policy::EvictionPolicy;
use crate::refresh::RefreshMode;
use crate::store::EntryStore;
use crate::time;

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// The internal, thread-safe core of a cache, shared by its handles and by
/// any background refresh it has in flight.
pub(crate) struct CacheShared<K, V, S> {
  pub(crate) name: Arc<str>,
  pub(crate) store: S,
  /// Serializes every structural change to `store` (new key, removal,
  /// eviction, clear) with the policy's bookkeeping. Hits never take it.
  pub(crate) eviction: Mutex<Box<dyn EvictionPolicy<K>>>,
  /// `None` means unbounded.
  pub(crate) max_items: Option<usize>,
  pub(crate) next_insertion: AtomicU64,
  pub(crate) expiry: Expiry,
  pub(crate) loader: Loader<K, V>,
  pub(crate) pending: PendingLoads<K, V>,
  pub(crate) max_wait: Option<Duration>,
  pub(crate) refresh: RefreshMode,
  pub(crate) destroyed: AtomicBool,
}

impl<K, V, S> fmt::Debug for CacheShared<K, V, S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("name", &self.name)
      .field("max_items", &self.max_items)
      .field("expiry", &self.expiry)
      .field("max_wait", &self.max_wait)
      .field("refresh", &self.refresh)
      .field("destroyed", &self.destroyed.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl<K, V, S> CacheShared<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: EntryStore<K, V> + 'static,
{
  /// The full lookup: fresh hit, first load, or stale refresh.
  pub(crate) fn get(shared: &Arc<Self>, key: &K) -> LoadOutcome<V> {
    if shared.is_destroyed() {
      return Err(shared.destroyed_error());
    }

    if let Some(entry) = shared.store.lookup(key) {
      if !shared.expiry.is_stale(&entry, time::now_nanos()) {
        return Ok(entry.value());
      }
      return Self::refresh_stale(shared, key, entry);
    }

    shared.coordinate_load(key)
  }

  /// Stores a freshly loaded value and trims the cache back to its bound.
  ///
  /// A reload keeps the key's original insertion order.
  pub(crate) fn publish(&self, key: &K, value: Arc<V>) {
    let mut policy = self.eviction.lock();
    if self.is_destroyed() {
      return;
    }

    match self.store.lookup(key) {
      Some(previous) => {
        let entry = CacheEntry::new(value, previous.insertion_order());
        self.store.insert(key.clone(), Arc::new(entry));
      }
      None => {
        let order = self.next_insertion.fetch_add(1, Ordering::Relaxed);
        self
          .store
          .insert(key.clone(), Arc::new(CacheEntry::new(value, order)));
        policy.on_insert(key);
        self.evict_overflow(&mut **policy);
      }
    }
  }

  fn evict_overflow(&self, policy: &mut dyn EvictionPolicy<K>) {
    let Some(max_items) = self.max_items else {
      return;
    };

    let mut evicted = 0usize;
    while self.store.len() > max_items {
      match policy.pop_victim() {
        Some(victim) => {
          if self.store.remove(&victim).is_some() {
            evicted += 1;
          }
        }
        None => break,
      }
    }

    if evicted > 0 {
      tracing::debug!(cache = %self.name, evicted, max_items, "evicted oldest entries");
    }
  }

  pub(crate) fn invalidate(&self, key: &K) -> bool {
    let mut policy = self.eviction.lock();
    if self.store.remove(key).is_some() {
      policy.on_remove(key);
      true
    } else {
      false
    }
  }

  /// Removes all entries. Loads already in flight still publish their value.
  pub(crate) fn clear(&self) {
    let mut policy = self.eviction.lock();
    self.store.clear_all();
    policy.clear();
    tracing::debug!(cache = %self.name, "cache cleared");
  }

  pub(crate) fn destroy(&self) {
    if self.destroyed.swap(true, Ordering::AcqRel) {
      return;
    }
    let mut policy = self.eviction.lock();
    self.store.clear_all();
    policy.clear();
    tracing::info!(cache = %self.name, "cache destroyed");
  }

  #[inline]
  pub(crate) fn size(&self) -> usize {
    self.store.len()
  }
}

impl<K, V, S> CacheShared<K, V, S> {
  #[inline]
  pub(crate) fn is_destroyed(&self) -> bool {
    self.destroyed.load(Ordering::Acquire)
  }

  pub(crate) fn destroyed_error(&self) -> LoadError {
    LoadError::Destroyed {
      cache: self.name.clone(),
    }
  }
}
