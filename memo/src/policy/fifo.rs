use super::EvictionPolicy;
use crate::policy::insertion_list::InsertionList;

use std::hash::Hash;

/// An eviction policy that evicts entries in a First-In, First-Out (FIFO)
/// manner: the key inserted longest ago goes first. Reads and reloads do not
/// change the order.
#[derive(Debug)]
pub struct Fifo<K: Eq + Hash + Clone> {
  list: InsertionList<K>,
}

impl<K: Eq + Hash + Clone> Fifo<K> {
  pub fn new() -> Self {
    Self {
      list: InsertionList::new(),
    }
  }

  /// Number of keys currently tracked.
  pub fn len(&self) -> usize {
    self.list.len()
  }

  pub fn is_empty(&self) -> bool {
    self.list.len() == 0
  }
}

impl<K: Eq + Hash + Clone> Default for Fifo<K> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K> EvictionPolicy<K> for Fifo<K>
where
  K: Eq + Hash + Clone + Send,
{
  fn on_insert(&mut self, key: &K) {
    self.list.push_front(key.clone());
  }

  fn on_remove(&mut self, key: &K) {
    self.list.remove(key);
  }

  fn pop_victim(&mut self) -> Option<K> {
    self.list.pop_back()
  }

  fn clear(&mut self) {
    self.list.clear();
  }
}
