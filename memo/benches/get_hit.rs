use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_memo::{CacheBuilder, Engine, LoadingCache};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const NUM_ITEMS: u64 = 10_000;

fn populated(engine: Engine) -> Arc<dyn LoadingCache<u64, u64>> {
  let cache = CacheBuilder::new()
    .engine(engine)
    .max_items(NUM_ITEMS as i64)
    .infallible_loader(|key: &u64| key.wrapping_mul(31))
    .build_dyn()
    .unwrap();

  // Pre-populate in a single thread for a consistent start.
  for key in 0..NUM_ITEMS {
    cache.get(&key).unwrap();
  }
  cache
}

fn bench_get_hit(c: &mut Criterion) {
  let mut group = c.benchmark_group("GetHit");
  group.throughput(Throughput::Elements(1));

  for engine in [Engine::Sharded, Engine::Concurrent] {
    let cache = populated(engine);
    group.bench_function(BenchmarkId::new("single_thread", format!("{engine:?}")), |b| {
      let mut key = 0u64;
      b.iter(|| {
        key = (key + 1) % NUM_ITEMS;
        black_box(cache.get(black_box(&key)).unwrap());
      })
    });
  }
  group.finish();
}

fn bench_get_hit_contended(c: &mut Criterion) {
  let mut group = c.benchmark_group("GetHitContended");

  for engine in [Engine::Sharded, Engine::Concurrent] {
    for concurrency in [2usize, 8] {
      let cache = populated(engine);
      group.throughput(Throughput::Elements(NUM_ITEMS));
      group.bench_with_input(
        BenchmarkId::new(format!("{engine:?}"), concurrency),
        &concurrency,
        |b, &concurrency| {
          b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
              let barrier = Arc::new(Barrier::new(concurrency + 1));
              let handles: Vec<_> = (0..concurrency)
                .map(|t| {
                  let cache = cache.clone();
                  let barrier = barrier.clone();
                  thread::spawn(move || {
                    barrier.wait();
                    let mut key = t as u64;
                    while key < NUM_ITEMS {
                      black_box(cache.get(&key).unwrap());
                      key += concurrency as u64;
                    }
                  })
                })
                .collect();

              barrier.wait();
              let start = Instant::now();
              for handle in handles {
                handle.join().unwrap();
              }
              total += start.elapsed();
            }
            total
          })
        },
      );
    }
  }
  group.finish();
}

criterion_group!(benches, bench_get_hit, bench_get_hit_contended);
criterion_main!(benches);
