mod common;

use common::{calls, counter};
use fibre_memo::{CacheBuilder, LoadError};
use std::io;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Barrier,
};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_first_get_calls_loader_once() {
  let load_count = counter();

  let cache = CacheBuilder::new()
    .infallible_loader({
      let load_count = load_count.clone();
      move |key: &i32| {
        load_count.fetch_add(1, Ordering::SeqCst);
        key * 10
      }
    })
    .build()
    .unwrap();

  assert_eq!(*cache.get(&5).unwrap(), 50);
  assert_eq!(calls(&load_count), 1, "Loader should be called once");

  assert_eq!(*cache.get(&5).unwrap(), 50);
  assert_eq!(calls(&load_count), 1, "Loader should NOT be called again");
  assert_eq!(cache.size(), 1);
}

#[test]
fn test_zero_ttl_never_reloads() {
  let load_count = counter();

  let cache = CacheBuilder::new()
    .ttl_millis(0)
    .infallible_loader({
      let load_count = load_count.clone();
      move |key: &String| {
        load_count.fetch_add(1, Ordering::SeqCst);
        key.to_uppercase()
      }
    })
    .build()
    .unwrap();

  let key = "foo".to_string();
  for _ in 0..100 {
    assert_eq!(*cache.get(&key).unwrap(), "FOO");
  }
  thread::sleep(Duration::from_millis(50));
  assert_eq!(*cache.get(&key).unwrap(), "FOO");
  assert_eq!(calls(&load_count), 1);
}

#[test]
fn test_thundering_herd_single_load() {
  let load_count = counter();
  let num_threads = 20;

  let cache = CacheBuilder::new()
    .infallible_loader({
      let load_count = load_count.clone();
      move |key: &i32| {
        // Simulate a slow database call or computation
        thread::sleep(Duration::from_millis(100));
        load_count.fetch_add(1, Ordering::SeqCst);
        key * 10
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for _ in 0..num_threads {
    let cache_clone = cache.clone();
    let barrier_clone = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier_clone.wait();
      // All threads request the same missing key at once
      let value = cache_clone.get(&99).unwrap();
      assert_eq!(*value, 990);
    }));
  }

  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(
    calls(&load_count),
    1,
    "Thundering herd protection failed: loader was called more than once"
  );
  assert_eq!(cache.size(), 1);
}

#[test]
fn test_different_keys_load_in_parallel() {
  let active = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let num_threads = 4;
  let load_time = Duration::from_millis(300);

  let cache = CacheBuilder::new()
    .infallible_loader({
      let active = active.clone();
      let peak = peak.clone();
      move |key: &usize| {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(load_time);
        active.fetch_sub(1, Ordering::SeqCst);
        *key
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let started = Instant::now();
  let handles: Vec<_> = (0..num_threads)
    .map(|key| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        assert_eq!(*cache.get(&key).unwrap(), key);
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  let elapsed = started.elapsed();
  assert!(peak.load(Ordering::SeqCst) >= 2, "loads of different keys overlapped");
  assert!(
    elapsed < load_time * num_threads as u32,
    "loads of different keys were serialized: {elapsed:?}"
  );
  assert_eq!(cache.size(), num_threads);
}

#[test]
fn test_loader_error_is_returned_and_not_cached() {
  let load_count = counter();

  let cache = CacheBuilder::new()
    .name("flaky")
    .loader({
      let load_count = load_count.clone();
      move |key: &i32| {
        if load_count.fetch_add(1, Ordering::SeqCst) == 0 {
          Err(io::Error::new(io::ErrorKind::Other, "backend down"))
        } else {
          Ok(key + 1)
        }
      }
    })
    .build()
    .unwrap();

  let err = cache.get(&1).unwrap_err();
  assert!(matches!(err, LoadError::Loader { .. }));
  assert!(err.is_loader_failure());
  assert!(err.to_string().contains("flaky"));
  assert!(err.to_string().contains("backend down"));
  assert_eq!(cache.size(), 0, "a failed load must not create an entry");

  assert_eq!(*cache.get(&1).unwrap(), 2, "the next get retries the loader");
  assert_eq!(calls(&load_count), 2);
}

#[test]
fn test_waiters_share_the_leaders_error() {
  let load_count = counter();
  let num_threads = 8;

  let cache = CacheBuilder::new()
    .loader({
      let load_count = load_count.clone();
      move |_key: &i32| -> Result<i32, String> {
        thread::sleep(Duration::from_millis(100));
        load_count.fetch_add(1, Ordering::SeqCst);
        Err("nope".to_string())
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.get(&7).unwrap_err()
      })
    })
    .collect();

  for handle in handles {
    let err = handle.join().unwrap();
    assert!(matches!(err, LoadError::Loader { .. }));
  }
  assert_eq!(calls(&load_count), 1);
}

#[test]
fn test_loader_panic_is_contained() {
  let num_threads = 5;

  let cache = CacheBuilder::new()
    .infallible_loader(|key: &i32| -> i32 {
      thread::sleep(Duration::from_millis(50));
      if *key == 13 {
        panic!("unlucky key");
      }
      *key
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.get(&13)
      })
    })
    .collect();

  for handle in handles {
    match handle.join().unwrap() {
      Err(LoadError::Panicked { message, .. }) => assert_eq!(message, "unlucky key"),
      other => panic!("expected a contained panic, got {other:?}"),
    }
  }

  // The cache is still usable afterwards.
  assert_eq!(*cache.get(&1).unwrap(), 1);
  assert_eq!(cache.size(), 1);
}

#[test]
fn test_absent_values_are_cached() {
  let load_count = counter();

  let cache = CacheBuilder::new()
    .infallible_loader({
      let load_count = load_count.clone();
      move |_key: &u8| -> Option<String> {
        load_count.fetch_add(1, Ordering::SeqCst);
        None
      }
    })
    .build()
    .unwrap();

  assert_eq!(*cache.get(&42).unwrap(), None);
  assert_eq!(*cache.get(&42).unwrap(), None);
  assert_eq!(calls(&load_count), 1);
}
