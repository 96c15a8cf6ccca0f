use fibre_memo::{CacheBuilder, RefreshPool};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct Data {
  version: usize,
  content: String,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
    .init();

  let load_counter = Arc::new(AtomicUsize::new(0));
  let pool = Arc::new(RefreshPool::new(2, 64).unwrap());

  let cache = CacheBuilder::new()
    .name("documents")
    .time_to_live(Duration::from_secs(2))
    .asynchronous_refresh(true)
    .refresh_pool(pool.clone())
    .infallible_loader({
      let counter = load_counter.clone();
      move |key: &String| {
        let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[Loader] Loading version {version} for key '{key}'...");
        thread::sleep(Duration::from_millis(500)); // Simulate slow load
        Data {
          version,
          content: format!("Content for {key} - version {version}"),
        }
      }
    })
    .build()
    .unwrap();

  let key = "my-data".to_string();

  println!("--- Step 1: Initial Load ---");
  let value = cache.get(&key).unwrap();
  println!("Received: {:?}", *value);
  assert_eq!(value.version, 1);

  println!("\n--- Step 2: Wait for TTL to expire (3 seconds) ---");
  thread::sleep(Duration::from_secs(3));

  println!("\n--- Step 3: Stale Read ---");
  let started = Instant::now();
  let value = cache.get(&key).unwrap();
  println!("Received: {:?} in {:?}", *value, started.elapsed());
  assert_eq!(value.version, 1, "the stale value is served immediately");

  println!("\n--- Step 4: Wait for the background refresh ---");
  thread::sleep(Duration::from_secs(1));
  let value = cache.get(&key).unwrap();
  println!("Received: {:?}", *value);
  assert_eq!(value.version, 2);

  pool.shutdown();
}
