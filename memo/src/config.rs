use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which storage engine backs a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Engine {
  /// Fixed array of cache-padded `RwLock<HashMap>` shards.
  #[default]
  Sharded,
  /// A `DashMap`.
  Concurrent,
}

/// Plain configuration values for a cache.
///
/// Everything here can come from a configuration file (feature `serde`,
/// camelCase keys). The loader cannot, so it is always supplied to the
/// [`CacheBuilder`](crate::CacheBuilder) separately:
///
/// ```
/// use fibre_memo::{CacheBuilder, CacheConfig};
///
/// let config = CacheConfig {
///   name: "users".into(),
///   max_items: 1_000,
///   ttl_millis: 30_000,
///   ..CacheConfig::default()
/// };
///
/// let cache = CacheBuilder::from_config(&config)
///   .infallible_loader(|id: &u64| format!("user-{id}"))
///   .build()
///   .unwrap();
/// # use fibre_memo::LoadingCache;
/// assert_eq!(*cache.get(&7).unwrap(), "user-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct CacheConfig {
  /// Label used in log events and error messages.
  pub name: String,
  /// `-1` for unbounded, otherwise the maximum number of live entries.
  pub max_items: i64,
  /// Time after which a loaded value is stale. `0` never expires.
  pub ttl_millis: u64,
  /// Serve stale values while reloading in the background.
  pub asynchronous_refresh: bool,
  /// Upper bound on how long a caller waits for someone else's load.
  pub max_wait_millis: Option<u64>,
  pub engine: Engine,
  /// Shard count hint, rounded up to a power of two.
  pub shards: Option<usize>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      name: "cache".to_string(),
      max_items: -1,
      ttl_millis: 0,
      asynchronous_refresh: false,
      max_wait_millis: None,
      engine: Engine::Sharded,
      shards: None,
    }
  }
}

impl CacheConfig {
  /// The configured time-to-live, or `None` if entries never expire.
  pub fn time_to_live(&self) -> Option<Duration> {
    (self.ttl_millis > 0).then(|| Duration::from_millis(self.ttl_millis))
  }

  pub fn max_wait(&self) -> Option<Duration> {
    self.max_wait_millis.map(Duration::from_millis)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_are_unbounded_and_never_expire() {
    let config = CacheConfig::default();
    assert_eq!(config.max_items, -1);
    assert_eq!(config.time_to_live(), None);
    assert_eq!(config.max_wait(), None);
    assert!(!config.asynchronous_refresh);
    assert_eq!(config.engine, Engine::Sharded);
  }

  #[test]
  fn test_duration_helpers() {
    let config = CacheConfig {
      ttl_millis: 250,
      max_wait_millis: Some(0),
      ..CacheConfig::default()
    };
    assert_eq!(config.time_to_live(), Some(Duration::from_millis(250)));
    assert_eq!(config.max_wait(), Some(Duration::ZERO));
  }
}
