use crate::error::SpawnError;

/// A unit of background work, usually one stale-entry refresh.
pub type RefreshTask = Box<dyn FnOnce() + Send + 'static>;

/// A trait for handing background refreshes to an executor.
///
/// One spawner is meant to be shared by many caches. [`RefreshPool`](crate::RefreshPool)
/// is the built-in implementation; `TokioSpawner` (feature `tokio`) runs
/// tasks on a Tokio runtime's blocking pool.
pub trait TaskSpawner: Send + Sync + 'static {
  /// Queues a task. Implementations must not run it on the calling thread.
  fn spawn(&self, task: RefreshTask) -> Result<(), SpawnError>;
}

/// Runs refresh tasks on a Tokio runtime's blocking thread pool. Loaders
/// are synchronous, so they never run on the async worker threads.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioSpawner(tokio::runtime::Handle);

#[cfg(feature = "tokio")]
impl TokioSpawner {
  /// Creates a spawner that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(tokio::runtime::Handle::current())
  }

  /// Creates a spawner from an explicit runtime handle.
  pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

#[cfg(feature = "tokio")]
impl TaskSpawner for TokioSpawner {
  fn spawn(&self, task: RefreshTask) -> Result<(), SpawnError> {
    drop(self.0.spawn_blocking(task));
    Ok(())
  }
}
