use crate::entry::{CacheEntry, RefreshClaim};
use crate::loader::LoadOutcome;
use crate::runtime::{RefreshTask, TaskSpawner};
use crate::shared::CacheShared;
use crate::store::EntryStore;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// How a stale entry gets reloaded.
pub(crate) enum RefreshMode {
  /// The caller reloads inline and receives the outcome, error included.
  Synchronous,
  /// The caller receives the stale value; the reload runs on the spawner.
  Asynchronous(Arc<dyn TaskSpawner>),
}

impl fmt::Debug for RefreshMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RefreshMode::Synchronous => f.write_str("Synchronous"),
      RefreshMode::Asynchronous(_) => f.write_str("Asynchronous"),
    }
  }
}

impl<K, V, S> CacheShared<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: EntryStore<K, V> + 'static,
{
  /// Handles a `get` that found a stale entry.
  pub(crate) fn refresh_stale(
    shared: &Arc<Self>,
    key: &K,
    entry: Arc<CacheEntry<V>>,
  ) -> LoadOutcome<V> {
    match &shared.refresh {
      RefreshMode::Synchronous => {
        // Concurrent callers all join the same load; only one holds the flag.
        let _claim = RefreshClaim::acquire(&entry);
        shared.coordinate_load(key)
      }
      RefreshMode::Asynchronous(spawner) => {
        // Only the caller that wins the claim schedules; everyone else just
        // takes the stale value.
        if let Some(claim) = RefreshClaim::acquire(&entry) {
          Self::schedule_refresh(shared, spawner.as_ref(), key, claim);
        }
        Ok(entry.value())
      }
    }
  }

  fn schedule_refresh(
    shared: &Arc<Self>,
    spawner: &dyn TaskSpawner,
    key: &K,
    claim: RefreshClaim<V>,
  ) {
    // The task must not keep a dropped cache alive. The claim travels with
    // it and is released however the task ends, including never running.
    let weak = Arc::downgrade(shared);
    let task_key = key.clone();
    let task: RefreshTask = Box::new(move || {
      if let Some(shared) = weak.upgrade() {
        shared.run_refresh(&task_key, claim.entry());
      }
    });

    match spawner.spawn(task) {
      Ok(()) => tracing::debug!(cache = %shared.name, "background refresh scheduled"),
      Err(err) => {
        tracing::warn!(cache = %shared.name, error = %err, "background refresh rejected")
      }
    }
  }

  /// Body of a background refresh. Failures are logged and swallowed; the
  /// stale entry is kept and its clock restarted so the next attempt waits a
  /// full TTL window.
  fn run_refresh(&self, key: &K, flagged: &CacheEntry<V>) {
    if self.is_destroyed() {
      return;
    }

    match self.coordinate_load(key) {
      Ok(_) => tracing::debug!(cache = %self.name, "background refresh completed"),
      Err(err) => {
        tracing::warn!(
          cache = %self.name,
          error = %err,
          "background refresh failed, keeping previous value"
        );
        flagged.mark_loaded_now();
      }
    }
  }
}
