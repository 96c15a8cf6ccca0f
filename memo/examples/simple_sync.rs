use fibre_memo::{CacheBuilder, LoadError};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct User {
  id: u64,
  name: String,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
    .init();

  let load_counter = Arc::new(AtomicUsize::new(0));

  let cache = CacheBuilder::new()
    .name("users")
    .max_items(2)
    .time_to_live(Duration::from_secs(1))
    .loader({
      let counter = load_counter.clone();
      move |id: &u64| -> Result<User, String> {
        counter.fetch_add(1, Ordering::SeqCst);
        println!("[Loader] Fetching user {id}...");
        thread::sleep(Duration::from_millis(200));
        if *id == 0 {
          return Err(format!("user {id} does not exist"));
        }
        Ok(User {
          id: *id,
          name: format!("user-{id}"),
        })
      }
    })
    .build()
    .unwrap();

  println!("--- Step 1: First access loads ---");
  let user = cache.get(&1).unwrap();
  println!("Received: {:?}", *user);

  println!("\n--- Step 2: Second access is a hit ---");
  let user = cache.get(&1).unwrap();
  println!("Received: {} ({})", user.name, user.id);
  println!("Loader calls: {}", load_counter.load(Ordering::SeqCst));

  println!("\n--- Step 3: Loader errors reach the caller ---");
  match cache.get(&0) {
    Err(err @ LoadError::Loader { .. }) => println!("Error: {err}"),
    other => println!("Unexpected: {other:?}"),
  }

  println!("\n--- Step 4: The size bound evicts the oldest key ---");
  cache.get(&2).unwrap();
  cache.get(&3).unwrap();
  println!("Size: {}", cache.size());

  println!("\n--- Step 5: Wait for the TTL, the next access reloads ---");
  thread::sleep(Duration::from_millis(1100));
  cache.get(&3).unwrap();
  println!("Loader calls: {}", load_counter.load(Ordering::SeqCst));
}
