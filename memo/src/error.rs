use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The boxed error type a loader may return.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur when building a cache.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// No loader was supplied. A loading cache cannot compute missing values
  /// without one.
  #[error("a loader must be configured before the cache can be built")]
  MissingLoader,
  /// `max_items` was below `-1`. Use `-1` for an unbounded cache.
  #[error("max_items must be -1 (unbounded) or a non-negative bound, got {0}")]
  InvalidMaxItems(i64),
  /// The cache was configured with zero shards, which is not allowed.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// A maximum wait of zero would fail every joined load immediately.
  #[error("max_wait cannot be zero; leave it unset to wait without a bound")]
  ZeroMaxWait,
  /// The default refresh pool could not start its worker threads.
  #[error("failed to start the refresh pool: {0}")]
  RefreshPool(#[source] io::Error),
}

/// Errors returned from `get`.
///
/// A single load may be observed by many callers, so the error is cheaply
/// cloneable and every caller joined to the same load receives the same value.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
  /// The loader returned an error for the requested key.
  #[error("loader failed in cache '{cache}': {source}")]
  Loader {
    cache: Arc<str>,
    #[source]
    source: Arc<dyn StdError + Send + Sync + 'static>,
  },
  /// The loader panicked. The panic is contained so that waiters are released.
  #[error("loader panicked in cache '{cache}': {message}")]
  Panicked { cache: Arc<str>, message: String },
  /// The caller waited longer than the configured maximum for another
  /// caller's in-flight load of the same key.
  #[error("gave up after {waited:?} waiting for an in-flight load in cache '{cache}'")]
  WaitTimeout { cache: Arc<str>, waited: Duration },
  /// `get` was called after `destroy`.
  #[error("cache '{cache}' has been destroyed")]
  Destroyed { cache: Arc<str> },
}

impl LoadError {
  /// Returns `true` if this error came from the loader itself (either an
  /// error return or a panic), as opposed to the cache's own bookkeeping.
  pub fn is_loader_failure(&self) -> bool {
    matches!(self, LoadError::Loader { .. } | LoadError::Panicked { .. })
  }
}

/// Errors returned by a [`TaskSpawner`](crate::TaskSpawner) that could not
/// accept a background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
  /// Every worker queue is full.
  #[error("refresh queue is full")]
  QueueFull,
  /// The spawner has been shut down.
  #[error("refresh spawner has been shut down")]
  ShutDown,
}
