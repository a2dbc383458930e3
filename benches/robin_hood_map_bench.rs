use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use robin_hood_map::RobinHoodMap;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(seed: u64, n: usize) -> (RobinHoodMap<String, u64>, Vec<String>) {
    let mut m = RobinHoodMap::new();
    let keys: Vec<String> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64);
    }
    (m, keys)
}

// 10k pseudo-random picks from `0..n`.
fn picks(n: usize) -> Vec<usize> {
    let mut s = 0x9e3779b97f4a7c15u64;
    (0..10_000)
        .map(|_| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            (s as usize) % n
        })
        .collect()
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("robin_hood::insert_fresh_100k", |b| {
        b.iter_batched(
            RobinHoodMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_reserved_100k(c: &mut Criterion) {
    c.bench_function("robin_hood::insert_reserved_100k", |b| {
        b.iter_batched(
            || {
                let mut m = RobinHoodMap::<String, u64>::new();
                m.reserve(100_000);
                m
            },
            |mut m| {
                for (i, x) in lcg(3).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove_random_10k(c: &mut Criterion) {
    c.bench_function("robin_hood::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let (m, keys) = filled(5, 110_000);
                let to_remove: Vec<String> =
                    picks(keys.len()).into_iter().map(|i| keys[i].clone()).collect();
                (m, to_remove)
            },
            |(mut m, to_remove)| {
                for k in &to_remove {
                    black_box(m.remove(k));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_10k(c: &mut Criterion) {
    c.bench_function("robin_hood::find_hit_10k_on_100k", |b| {
        let (m, keys) = filled(7, 100_000);
        let queries: Vec<&String> = picks(keys.len()).into_iter().map(|i| &keys[i]).collect();
        b.iter(|| {
            for k in &queries {
                black_box(m.get(*k));
            }
        })
    });
}

fn bench_find_miss_10k(c: &mut Criterion) {
    c.bench_function("robin_hood::find_miss_10k_on_100k", |b| {
        let (m, _) = filled(11, 100_000);
        let misses: Vec<String> = lcg(0xdead_beef).take(10_000).map(key).collect();
        b.iter(|| {
            for k in &misses {
                black_box(m.get(k));
            }
        })
    });
}

fn bench_get_or_default_10k(c: &mut Criterion) {
    c.bench_function("robin_hood::get_or_default_increment_10k", |b| {
        b.iter_batched(
            || filled(123, 100_000),
            |(mut m, keys)| {
                for i in picks(keys.len()) {
                    let v = m.get_or_default(keys[i].clone());
                    *v = v.wrapping_add(1);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iter_and_iter_mut(c: &mut Criterion) {
    c.bench_function("robin_hood::iter_all_100k", |b| {
        let (m, _) = filled(999, 100_000);
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in m.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("robin_hood::iter_mut_increment_all_100k", |b| {
        b.iter_batched(
            || filled(1001, 100_000).0,
            |mut m| {
                for (_k, v) in m.iter_mut() {
                    *v = v.wrapping_add(1);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_clone_100k(c: &mut Criterion) {
    c.bench_function("robin_hood::clone_100k", |b| {
        let (m, _) = filled(2024, 100_000);
        b.iter(|| black_box(m.clone()))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_insert_reserved_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_remove_random_10k,
              bench_find_hit_10k,
              bench_find_miss_10k,
              bench_get_or_default_10k,
              bench_iter_and_iter_mut,
              bench_clone_100k
}
criterion_main!(benches_insert, benches_ops);
