use crate::entry::CacheEntry;

use std::time::Duration;

/// Decides whether an entry is still fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expiry {
  /// 0 disables expiry.
  ttl_nanos: u64,
}

impl Expiry {
  pub(crate) fn new(time_to_live: Option<Duration>) -> Self {
    Self {
      ttl_nanos: time_to_live.map_or(0, |ttl| ttl.as_nanos().min(u64::MAX as u128) as u64),
    }
  }

  /// An entry is stale once a full TTL window has passed since it was loaded.
  #[inline]
  pub(crate) fn is_stale<V>(&self, entry: &CacheEntry<V>, now_nanos: u64) -> bool {
    if self.ttl_nanos == 0 {
      return false;
    }
    now_nanos.saturating_sub(entry.load_timestamp()) >= self.ttl_nanos
  }
}
