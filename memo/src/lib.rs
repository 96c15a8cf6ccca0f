//! An embeddable, in-process loading cache.
//!
//! A loading cache computes a missing value with a loader you supply,
//! keeps it in memory, and reloads it once it goes stale.
//!
//! # Features
//! - **Single-flight loads**: concurrent requests for the same key share one
//!   loader call; different keys load in parallel.
//! - **Time-to-live**: entries go stale after a fixed window.
//! - **Two refresh disciplines**: reload stale entries inline (errors reach
//!   the caller), or serve the stale value while a shared worker pool reloads
//!   it in the background.
//! - **Bounded size**: an optional item limit, evicting in insertion order.
//! - **Two engines**: a sharded `RwLock<HashMap>` store (`Cache`) and a
//!   `DashMap` store (`ConcurrentCache`) behind one [`LoadingCache`] trait.
//!
//! ```
//! use fibre_memo::{CacheBuilder, LoadingCache};
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::new()
//!   .name("squares")
//!   .max_items(100)
//!   .time_to_live(Duration::from_secs(60))
//!   .infallible_loader(|n: &u64| n * n)
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(*cache.get(&12).unwrap(), 144);
//! assert_eq!(cache.size(), 1);
//! ```

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod policy;
pub mod runtime;

// Internal, crate-only modules
mod coordinator;
mod entry;
mod expiry;
mod loader;
mod refresh;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use config::{CacheConfig, Engine};
pub use error::{BoxError, ConfigError, LoadError, SpawnError};
pub use handles::{Cache, ConcurrentCache, LoadingCache};
pub use runtime::{RefreshTask, TaskSpawner};
pub use task::pool::{RefreshPool, DEFAULT_QUEUE_CAPACITY};

#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
