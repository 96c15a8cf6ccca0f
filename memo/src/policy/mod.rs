//! Eviction policies that keep a bounded cache within its item limit.

pub mod fifo;
mod insertion_list;
pub mod null;

pub use fifo::Fifo;
pub use null::NullPolicy;

/// Tracks keys for eviction.
///
/// The cache calls every method while holding its eviction lock, so
/// implementations see a consistent, serialized stream of events and do not
/// need interior locking.
pub trait EvictionPolicy<K>: Send {
  /// Called when a key is inserted for the first time. Reloads of a key
  /// that is already present do not call this.
  fn on_insert(&mut self, key: &K);

  /// Called when a key is removed outside of eviction (invalidate).
  fn on_remove(&mut self, key: &K);

  /// Picks and forgets the next key to evict, or `None` if nothing is tracked.
  fn pop_victim(&mut self) -> Option<K>;

  /// Clears all state from the policy.
  fn clear(&mut self);
}
