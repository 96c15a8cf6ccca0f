#![allow(dead_code)]

use fibre_memo::{RefreshTask, SpawnError, TaskSpawner};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

// A shared loader call counter.
pub fn counter() -> Arc<AtomicUsize> {
  Arc::new(AtomicUsize::new(0))
}

pub fn calls(counter: &AtomicUsize) -> usize {
  counter.load(Ordering::SeqCst)
}

// A spawner that only queues tasks. Tests decide when background refreshes
// run, which makes async-mode assertions deterministic.
#[derive(Default)]
pub struct ManualSpawner {
  tasks: Mutex<Vec<RefreshTask>>,
}

impl ManualSpawner {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn pending(&self) -> usize {
    self.tasks.lock().unwrap().len()
  }

  // Runs every queued task on the calling thread and returns how many ran.
  pub fn run_all(&self) -> usize {
    let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
    let ran = tasks.len();
    for task in tasks {
      task();
    }
    ran
  }
}

impl TaskSpawner for ManualSpawner {
  fn spawn(&self, task: RefreshTask) -> Result<(), SpawnError> {
    self.tasks.lock().unwrap().push(task);
    Ok(())
  }
}

// A spawner whose queue is always full.
#[derive(Default)]
pub struct RejectingSpawner {
  pub attempts: AtomicUsize,
}

impl TaskSpawner for RejectingSpawner {
  fn spawn(&self, _task: RefreshTask) -> Result<(), SpawnError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    Err(SpawnError::QueueFull)
  }
}

// A spawner that accepts the first `drops` tasks and discards them unrun, the
// way a runtime that has shut down does. Later tasks go to `inner`.
pub struct DroppingSpawner {
  drops: AtomicUsize,
  pub attempts: AtomicUsize,
  pub inner: Arc<ManualSpawner>,
}

impl DroppingSpawner {
  pub fn new(drops: usize) -> Arc<Self> {
    Arc::new(Self {
      drops: AtomicUsize::new(drops),
      attempts: AtomicUsize::new(0),
      inner: ManualSpawner::new(),
    })
  }
}

impl TaskSpawner for DroppingSpawner {
  fn spawn(&self, task: RefreshTask) -> Result<(), SpawnError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    let dropped = self
      .drops
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
      .is_ok();
    if dropped {
      drop(task);
      Ok(())
    } else {
      self.inner.spawn(task)
    }
  }
}
