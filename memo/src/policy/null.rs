use crate::policy::EvictionPolicy;

/// The policy for unbounded caches. It tracks nothing and never evicts.
#[derive(Debug, Default)]
pub struct NullPolicy;

impl<K> EvictionPolicy<K> for NullPolicy {
  fn on_insert(&mut self, _key: &K) {}

  fn on_remove(&mut self, _key: &K) {}

  fn pop_victim(&mut self) -> Option<K> {
    None
  }

  fn clear(&mut self) {}
}
