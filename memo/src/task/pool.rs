use crate::error::SpawnError;
use crate::runtime::{RefreshTask, TaskSpawner};

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;
use fibre::TrySendError;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

/// Total queue slots of the default pool, split evenly across its workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

static SHARED_POOL: OnceCell<Arc<RefreshPool>> = OnceCell::new();

/// A fixed set of worker threads that run background refreshes for any
/// number of caches.
///
/// Each worker owns a bounded queue. Tasks are handed out round-robin; when
/// the chosen queue is full the next one is tried, and a task is rejected
/// with [`SpawnError::QueueFull`] only when every queue is full.
pub struct RefreshPool {
  senders: RwLock<Vec<mpsc::BoundedSender<RefreshTask>>>,
  handles: Mutex<Vec<JoinHandle<()>>>,
  next: AtomicUsize,
  queue_capacity: usize,
}

impl fmt::Debug for RefreshPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RefreshPool")
      .field("workers", &self.senders.read().len())
      .field("queue_capacity", &self.queue_capacity)
      .finish()
  }
}

impl RefreshPool {
  /// Starts `workers` threads (at least one) sharing `queue_capacity`
  /// queued tasks between them.
  pub fn new(workers: usize, queue_capacity: usize) -> io::Result<Self> {
    let workers = workers.max(1);
    let per_worker = queue_capacity.max(1).div_ceil(workers);

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for index in 0..workers {
      let (tx, rx): (
        mpsc::BoundedSender<RefreshTask>,
        mpsc::BoundedReceiver<RefreshTask>,
      ) = mpsc::bounded(per_worker);

      let handle = thread::Builder::new()
        .name(format!("fibre-memo-refresh-{index}"))
        .spawn(move || {
          // The loop ends once the pool drops its sender and the queue drains.
          while let Ok(task) = rx.recv() {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
              tracing::warn!(worker = index, "refresh task panicked");
            }
          }
        })?;

      senders.push(tx);
      handles.push(handle);
    }

    tracing::info!(workers, queue_capacity = per_worker * workers, "refresh pool started");

    Ok(Self {
      senders: RwLock::new(senders),
      handles: Mutex::new(handles),
      next: AtomicUsize::new(0),
      queue_capacity: per_worker * workers,
    })
  }

  /// The process-wide pool used by caches that enable asynchronous refresh
  /// without supplying their own spawner. Created on first use.
  pub fn shared() -> io::Result<Arc<RefreshPool>> {
    SHARED_POOL
      .get_or_try_init(|| {
        let workers = num_cpus::get().clamp(2, 8);
        RefreshPool::new(workers, DEFAULT_QUEUE_CAPACITY).map(Arc::new)
      })
      .cloned()
  }

  /// Number of worker threads still accepting work.
  pub fn worker_count(&self) -> usize {
    self.senders.read().len()
  }

  /// Total queued tasks the pool can hold.
  pub fn queue_capacity(&self) -> usize {
    self.queue_capacity
  }

  pub fn is_shut_down(&self) -> bool {
    self.senders.read().is_empty()
  }

  /// Stops accepting tasks, lets the workers drain what is already queued,
  /// and joins them.
  pub fn shutdown(&self) {
    let senders = std::mem::take(&mut *self.senders.write());
    if senders.is_empty() {
      return;
    }
    drop(senders);

    let handles = std::mem::take(&mut *self.handles.lock());
    let me = thread::current().id();
    for handle in handles {
      // A task that shuts the pool down cannot join its own worker.
      if handle.thread().id() == me {
        continue;
      }
      if handle.join().is_err() {
        tracing::warn!("refresh worker exited with a panic");
      }
    }
    tracing::info!("refresh pool shut down");
  }
}

impl TaskSpawner for RefreshPool {
  fn spawn(&self, task: RefreshTask) -> Result<(), SpawnError> {
    let senders = self.senders.read();
    if senders.is_empty() {
      return Err(SpawnError::ShutDown);
    }

    let start = self.next.fetch_add(1, Ordering::Relaxed);
    let mut task = task;
    for offset in 0..senders.len() {
      let sender = &senders[(start + offset) % senders.len()];
      match sender.try_send(task) {
        Ok(()) => return Ok(()),
        Err(TrySendError::Full(returned)) => task = returned,
        Err(_) => return Err(SpawnError::ShutDown),
      }
    }
    Err(SpawnError::QueueFull)
  }
}

impl Drop for RefreshPool {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Barrier;
  use std::time::Duration;

  #[test]
  fn test_tasks_run_on_worker_threads() {
    let pool = RefreshPool::new(2, 8).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    let caller = thread::current().id();

    for _ in 0..6 {
      let ran = ran.clone();
      pool
        .spawn(Box::new(move || {
          assert_ne!(thread::current().id(), caller);
          ran.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.shutdown();
    assert_eq!(ran.load(Ordering::SeqCst), 6, "shutdown drains queued tasks");
  }

  #[test]
  fn test_full_queues_reject_new_tasks() {
    let pool = RefreshPool::new(1, 1).unwrap();
    let gate = Arc::new(Barrier::new(2));

    // Occupy the single worker until the gate opens.
    let blocker = gate.clone();
    pool
      .spawn(Box::new(move || {
        blocker.wait();
      }))
      .unwrap();
    thread::sleep(Duration::from_millis(50));

    // Fill the one queue slot, then overflow it.
    pool.spawn(Box::new(|| {})).unwrap();
    assert_eq!(pool.spawn(Box::new(|| {})), Err(SpawnError::QueueFull));

    gate.wait();
    pool.shutdown();
  }

  #[test]
  fn test_spawn_after_shutdown_fails() {
    let pool = RefreshPool::new(1, 4).unwrap();
    pool.shutdown();
    assert!(pool.is_shut_down());
    assert_eq!(pool.worker_count(), 0);
    assert_eq!(pool.spawn(Box::new(|| {})), Err(SpawnError::ShutDown));
  }

  #[test]
  fn test_panicking_task_does_not_kill_the_worker() {
    let pool = RefreshPool::new(1, 4).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    pool.spawn(Box::new(|| panic!("boom"))).unwrap();
    let counter = ran.clone();
    pool
      .spawn(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      }))
      .unwrap();

    pool.shutdown();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_shared_pool_is_reused() {
    let a = RefreshPool::shared().unwrap();
    let b = RefreshPool::shared().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.worker_count() >= 2);
  }
}
