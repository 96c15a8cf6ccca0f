use crate::error::LoadError;
use crate::loader::{LoadFuture, LoadOutcome};
use crate::shared::CacheShared;
use crate::store::{hash_key, EntryStore};
use crate::time;

use std::any::Any;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// The registry of loads currently in flight, one `LoadFuture` per key.
///
/// Sharded by key hash so that registering a load only contends with keys
/// that land on the same shard, and never for longer than a map operation.
pub(crate) struct PendingLoads<K, V, H = ahash::RandomState> {
  shards: Box<[Mutex<HashMap<K, Arc<LoadFuture<V>>, H>>]>,
  hasher: H,
}

impl<K, V, H> PendingLoads<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// `num_shards` must be a power of two.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    debug_assert!(num_shards.is_power_of_two());
    let shards = (0..num_shards)
      .map(|_| Mutex::new(HashMap::with_hasher(hasher.clone())))
      .collect::<Vec<_>>();
    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn shard(&self, key: &K) -> &Mutex<HashMap<K, Arc<LoadFuture<V>>, H>> {
    let index = hash_key(&self.hasher, key) as usize & (self.shards.len() - 1);
    &self.shards[index]
  }

  /// Number of keys with a load in flight.
  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.shards.iter().map(|shard| shard.lock().len()).sum()
  }
}

impl<K, V, S> CacheShared<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: EntryStore<K, V> + 'static,
{
  /// Loads `key`, making sure only one loader call runs for it at a time.
  ///
  /// The first caller becomes the leader and runs the loader on its own
  /// thread. Everyone else who asks for the key meanwhile waits on the same
  /// `LoadFuture` and receives the leader's outcome.
  pub(crate) fn coordinate_load(&self, key: &K) -> LoadOutcome<V> {
    let (future, is_leader) = {
      let mut pending = self.pending.shard(key).lock();
      if let Some(existing) = pending.get(key) {
        (existing.clone(), false)
      } else {
        // A load that finished while we queued on this lock has already
        // published its value.
        if let Some(entry) = self.store.lookup(key) {
          if !self.expiry.is_stale(&entry, time::now_nanos()) {
            return Ok(entry.value());
          }
        }

        let future = Arc::new(LoadFuture::new());
        pending.insert(key.clone(), future.clone());
        (future, true)
      }
    }; // The pending shard lock is released here, before any loader runs.

    if !is_leader {
      return self.join_load(&future);
    }

    let outcome = self.invoke_loader(key);
    if let Ok(value) = &outcome {
      self.publish(key, value.clone());
    }

    // Publish first, then deregister: a caller arriving in between either
    // joins the future or finds the fresh entry.
    self.pending.shard(key).lock().remove(key);
    future.complete(outcome.clone());
    outcome
  }

  fn join_load(&self, future: &LoadFuture<V>) -> LoadOutcome<V> {
    let deadline = self.max_wait.map(|wait| Instant::now() + wait);
    match future.wait(deadline) {
      Some(outcome) => outcome,
      None => {
        let waited = self.max_wait.unwrap_or_default();
        tracing::debug!(cache = %self.name, ?waited, "gave up waiting for in-flight load");
        Err(LoadError::WaitTimeout {
          cache: self.name.clone(),
          waited,
        })
      }
    }
  }

  fn invoke_loader(&self, key: &K) -> LoadOutcome<V> {
    tracing::debug!(cache = %self.name, "invoking loader");
    let started = Instant::now();

    match panic::catch_unwind(AssertUnwindSafe(|| (self.loader)(key))) {
      Ok(Ok(value)) => {
        tracing::debug!(
          cache = %self.name,
          elapsed_ms = started.elapsed().as_millis() as u64,
          "loader completed"
        );
        Ok(Arc::new(value))
      }
      Ok(Err(source)) => {
        tracing::debug!(cache = %self.name, error = %source, "loader failed");
        Err(LoadError::Loader {
          cache: self.name.clone(),
          source: Arc::from(source),
        })
      }
      Err(payload) => {
        let message = panic_message(payload.as_ref());
        tracing::warn!(cache = %self.name, %message, "loader panicked");
        Err(LoadError::Panicked {
          cache: self.name.clone(),
          message,
        })
      }
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
