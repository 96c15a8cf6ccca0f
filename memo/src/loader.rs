use crate::error::{BoxError, LoadError};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Instant;

/// The result every caller joined to a load observes.
pub(crate) type LoadOutcome<V> = Result<Arc<V>, LoadError>;

/// The user's loader, type-erased so the builder and the cache core are not
/// generic over the closure type.
pub(crate) type Loader<K, V> = Arc<dyn Fn(&K) -> Result<V, BoxError> + Send + Sync>;

/// The internal state of a value being loaded.
pub(crate) enum State<V> {
  Computing,
  Complete(LoadOutcome<V>),
}

/// The internal, mutex-protected core of the LoadFuture.
pub(crate) struct Inner<V> {
  pub(crate) state: State<V>,
  pub(crate) waiters: VecDeque<Thread>,
}

/// A pending load that any number of threads can wait on.
///
/// The leader completes it exactly once. Waiters park until then, optionally
/// with a deadline.
pub(crate) struct LoadFuture<V> {
  pub(crate) inner: Mutex<Inner<V>>,
}

impl<V> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the "Computing" state.
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Computing,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Completes the future with an outcome, waking all waiters.
  pub fn complete(&self, outcome: LoadOutcome<V>) {
    let mut inner = self.inner.lock();
    inner.state = State::Complete(outcome);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks the current thread until the load completes or `deadline`
  /// passes. Returns `None` on timeout.
  pub fn wait(&self, deadline: Option<Instant>) -> Option<LoadOutcome<V>> {
    let me = thread::current();
    let mut inner = self.inner.lock();
    loop {
      if let State::Complete(outcome) = &inner.state {
        return Some(outcome.clone());
      }

      // Parking can wake spuriously, so only register once.
      if !inner.waiters.iter().any(|t| t.id() == me.id()) {
        inner.waiters.push_back(me.clone());
      }
      drop(inner); // Unlock before parking.

      match deadline {
        Some(deadline) => {
          let now = Instant::now();
          if now >= deadline {
            let mut inner = self.inner.lock();
            return match &inner.state {
              State::Complete(outcome) => Some(outcome.clone()),
              State::Computing => {
                inner.waiters.retain(|t| t.id() != me.id());
                None
              }
            };
          }
          thread::park_timeout(deadline - now);
        }
        None => thread::park(),
      }

      inner = self.inner.lock();
    }
  }
}
