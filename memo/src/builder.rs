use crate::config::{CacheConfig, Engine};
use crate::coordinator::PendingLoads;
use crate::error::{BoxError, ConfigError};
use crate::expiry::Expiry;
use crate::handles::{Cache, ConcurrentCache, LoadingCache};
use crate::loader::Loader;
use crate::policy::{EvictionPolicy, Fifo, NullPolicy};
use crate::refresh::RefreshMode;
use crate::shared::CacheShared;
use crate::store::{ConcurrentStore, EntryStore, ShardedStore};
use crate::task::pool::RefreshPool;
use crate::TaskSpawner;

use core::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A builder for `Cache` and `ConcurrentCache` instances.
///
/// Every cache needs a loader; everything else has a default: unbounded,
/// never expiring, synchronous refresh, sharded engine.
pub struct CacheBuilder<K, V> {
  name: String,
  max_items: i64,
  time_to_live: Option<Duration>,
  asynchronous_refresh: bool,
  max_wait: Option<Duration>,
  engine: Engine,
  shards: usize,
  policy: Option<Box<dyn EvictionPolicy<K>>>,
  loader: Option<Loader<K, V>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("max_items", &self.max_items)
      .field("time_to_live", &self.time_to_live)
      .field("asynchronous_refresh", &self.asynchronous_refresh)
      .field("max_wait", &self.max_wait)
      .field("engine", &self.engine)
      .field("shards", &self.shards)
      .field("has_policy", &self.policy.is_some())
      .field("has_loader", &self.loader.is_some())
      .field("has_spawner", &self.spawner.is_some())
      .finish()
  }
}

impl<K, V> CacheBuilder<K, V> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      name: CacheConfig::default().name,
      max_items: -1,
      time_to_live: None,
      asynchronous_refresh: false,
      max_wait: None,
      engine: Engine::Sharded,
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      policy: None,
      loader: None,
      spawner: None,
      _marker: PhantomData,
    }
  }

  /// Seeds a builder from plain configuration values. A loader still has to
  /// be supplied before building.
  pub fn from_config(config: &CacheConfig) -> Self {
    let mut builder = Self::new()
      .name(config.name.clone())
      .max_items(config.max_items)
      .asynchronous_refresh(config.asynchronous_refresh)
      .engine(config.engine);
    builder.time_to_live = config.time_to_live();
    builder.max_wait = config.max_wait();
    if let Some(shards) = config.shards {
      // Kept as given so that a zero is reported by `build`.
      builder.shards = shards;
    }
    builder
  }

  /// Sets the name used in log events and error messages.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Bounds the number of live entries. `-1` means unbounded; anything
  /// below that is rejected by `build`.
  pub fn max_items(mut self, max_items: i64) -> Self {
    self.max_items = max_items;
    self
  }

  pub fn unbounded(mut self) -> Self {
    self.max_items = -1;
    self
  }

  /// Sets how long a loaded value stays fresh. `Duration::ZERO` disables
  /// expiry, the same as never calling this.
  pub fn time_to_live(mut self, duration: Duration) -> Self {
    self.time_to_live = (!duration.is_zero()).then_some(duration);
    self
  }

  pub fn ttl_millis(self, millis: u64) -> Self {
    self.time_to_live(Duration::from_millis(millis))
  }

  /// When enabled, a stale entry is returned immediately while a background
  /// task reloads it. Without an explicit [`spawner`](Self::spawner) the
  /// process-wide [`RefreshPool::shared`] pool runs those tasks.
  pub fn asynchronous_refresh(mut self, enabled: bool) -> Self {
    self.asynchronous_refresh = enabled;
    self
  }

  /// Caps how long a caller waits for another caller's in-flight load of
  /// the same key before failing with `LoadError::WaitTimeout`.
  pub fn max_wait(mut self, duration: Duration) -> Self {
    self.max_wait = Some(duration);
    self
  }

  /// Selects the engine used by [`build_dyn`](Self::build_dyn).
  pub fn engine(mut self, engine: Engine) -> Self {
    self.engine = engine;
    self
  }

  /// Sets the number of concurrent shards to use.
  pub fn shards(mut self, shards: usize) -> Self {
    // Ensure shards is at least 1 and a power of two for fast bitwise ANDing.
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Sets a custom eviction policy for a bounded cache.
  ///
  /// By default, a bounded cache evicts in insertion order with `Fifo`. An
  /// unbounded cache never evicts and ignores this setting.
  pub fn eviction_policy<P>(mut self, policy: P) -> Self
  where
    P: EvictionPolicy<K> + 'static,
  {
    self.policy = Some(Box::new(policy));
    self
  }

  /// Sets the loader. Its errors are boxed and returned from `get` as
  /// `LoadError::Loader`.
  pub fn loader<F, E>(mut self, f: F) -> Self
  where
    F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.loader = Some(Arc::new(move |key: &K| f(key).map_err(Into::into)));
    self
  }

  /// Sets a loader that cannot fail.
  pub fn infallible_loader<F>(mut self, f: F) -> Self
  where
    F: Fn(&K) -> V + Send + Sync + 'static,
  {
    self.loader = Some(Arc::new(move |key: &K| Ok(f(key))));
    self
  }

  /// Sets the executor for background refreshes. Only used with
  /// `asynchronous_refresh(true)`.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  pub fn refresh_pool(self, pool: Arc<RefreshPool>) -> Self {
    self.spawner(pool)
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.loader.is_none() {
      return Err(ConfigError::MissingLoader);
    }
    if self.max_items < -1 {
      return Err(ConfigError::InvalidMaxItems(self.max_items));
    }
    if self.shards == 0 {
      return Err(ConfigError::ZeroShards);
    }
    if self.max_wait == Some(Duration::ZERO) {
      return Err(ConfigError::ZeroMaxWait);
    }
    Ok(())
  }
}

impl<K, V> Default for CacheBuilder<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V> CacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Builds a cache on the sharded engine.
  pub fn build(self) -> Result<Cache<K, V>, ConfigError> {
    let shared = self.build_shared_core(ShardedStore::new)?;
    Ok(Cache { shared })
  }

  /// Builds a cache on the `DashMap` engine.
  pub fn build_concurrent(self) -> Result<ConcurrentCache<K, V>, ConfigError> {
    let shared = self.build_shared_core(ConcurrentStore::new)?;
    Ok(ConcurrentCache { shared })
  }

  /// Builds a cache on whichever engine was selected with
  /// [`engine`](Self::engine).
  pub fn build_dyn(self) -> Result<Arc<dyn LoadingCache<K, V>>, ConfigError> {
    let cache: Arc<dyn LoadingCache<K, V>> = match self.engine {
      Engine::Sharded => Arc::new(self.build()?),
      Engine::Concurrent => Arc::new(self.build_concurrent()?),
    };
    Ok(cache)
  }

  /// Central logic to construct the shared core of the cache.
  fn build_shared_core<S>(
    mut self,
    make_store: impl FnOnce(usize, ahash::RandomState) -> S,
  ) -> Result<Arc<CacheShared<K, V, S>>, ConfigError>
  where
    S: EntryStore<K, V> + 'static,
  {
    self.validate()?;
    let Some(loader) = self.loader.take() else {
      return Err(ConfigError::MissingLoader);
    };

    let refresh = if self.asynchronous_refresh {
      let spawner = match self.spawner.take() {
        Some(spawner) => spawner,
        None => RefreshPool::shared().map_err(ConfigError::RefreshPool)? as Arc<dyn TaskSpawner>,
      };
      RefreshMode::Asynchronous(spawner)
    } else {
      RefreshMode::Synchronous
    };

    // A negative bound is only ever -1 here, which means unbounded.
    let max_items = usize::try_from(self.max_items).ok();
    let eviction: Box<dyn EvictionPolicy<K>> = match (max_items, self.policy.take()) {
      (None, _) => Box::new(NullPolicy),
      (Some(_), Some(policy)) => policy,
      (Some(_), None) => Box::new(Fifo::new()),
    };

    let shards = self.shards.next_power_of_two();
    let hasher = ahash::RandomState::new();

    let shared = Arc::new(CacheShared {
      name: Arc::from(self.name),
      store: make_store(shards, hasher.clone()),
      eviction: Mutex::new(eviction),
      max_items,
      next_insertion: AtomicU64::new(0),
      expiry: Expiry::new(self.time_to_live),
      loader,
      pending: PendingLoads::new(shards, hasher),
      max_wait: self.max_wait,
      refresh,
      destroyed: AtomicBool::new(false),
    });

    tracing::info!(
      cache = %shared.name,
      max_items = self.max_items,
      time_to_live = ?self.time_to_live,
      max_wait = ?shared.max_wait,
      refresh = ?shared.refresh,
      engine = ?self.engine,
      shards,
      "cache built"
    );
    Ok(shared)
  }
}
