use crate::time;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A container for a value in the cache, holding all necessary metadata.
pub(crate) struct CacheEntry<V> {
  /// The user's value, wrapped in an Arc for shared ownership.
  value: Arc<V>,
  /// When the value was last loaded, in nanoseconds since the cache epoch.
  /// A failed background refresh also advances this.
  loaded_at: AtomicU64,
  /// Sequence number handed out when the key was first inserted. Reloads
  /// inherit it.
  insertion_order: u64,
  /// Set while a reload for this key is in flight.
  refreshing: AtomicBool,
}

impl<V> fmt::Debug for CacheEntry<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("loaded_at", &self.loaded_at.load(Ordering::Relaxed))
      .field("insertion_order", &self.insertion_order)
      .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl<V> CacheEntry<V> {
  /// Creates an entry for a value that was just loaded.
  pub(crate) fn new(value: Arc<V>, insertion_order: u64) -> Self {
    Self::with_timestamp(value, insertion_order, time::now_nanos())
  }

  /// Creates an entry with an explicit load timestamp.
  pub(crate) fn with_timestamp(value: Arc<V>, insertion_order: u64, loaded_at: u64) -> Self {
    Self {
      value,
      loaded_at: AtomicU64::new(loaded_at),
      insertion_order,
      refreshing: AtomicBool::new(false),
    }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn load_timestamp(&self) -> u64 {
    self.loaded_at.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn insertion_order(&self) -> u64 {
    self.insertion_order
  }

  /// Pushes the load timestamp forward to now without touching the value.
  ///
  /// Used after a failed background refresh so the entry stays fresh for one
  /// more TTL window instead of triggering a reload on every access.
  pub(crate) fn mark_loaded_now(&self) {
    self.loaded_at.fetch_max(time::now_nanos(), Ordering::AcqRel);
  }

  #[cfg(test)]
  pub(crate) fn is_refreshing(&self) -> bool {
    self.refreshing.load(Ordering::Acquire)
  }

  /// Claims the refresh for this entry. Returns `false` if another reload
  /// already holds it.
  #[inline]
  pub(crate) fn try_begin_refresh(&self) -> bool {
    self
      .refreshing
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  #[inline]
  fn end_refresh(&self) {
    self.refreshing.store(false, Ordering::Release);
  }
}

/// Ownership of an entry's `refreshing` flag. Dropping it clears the flag,
/// so a reload that is discarded unrun still releases the entry.
pub(crate) struct RefreshClaim<V> {
  entry: Arc<CacheEntry<V>>,
}

impl<V> RefreshClaim<V> {
  /// Claims `entry`, or returns `None` if a reload already holds it.
  pub(crate) fn acquire(entry: &Arc<CacheEntry<V>>) -> Option<Self> {
    entry.try_begin_refresh().then(|| Self {
      entry: entry.clone(),
    })
  }

  #[inline]
  pub(crate) fn entry(&self) -> &CacheEntry<V> {
    &self.entry
  }
}

impl<V> Drop for RefreshClaim<V> {
  fn drop(&mut self) {
    self.entry.end_refresh();
  }
}
