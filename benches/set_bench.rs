use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tollfree::{CountedSet, MutableSet, Object, Set};

// Small deterministic generator so runs are comparable.
fn lcg(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state >> 11
}

fn key(n: u64) -> Object {
    Object::from(format!("k{:016x}", n))
}

fn keys(seed: u64, n: usize) -> Vec<Object> {
    let mut s = seed;
    (0..n).map(|_| key(lcg(&mut s))).collect()
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("set::add");
    group.throughput(Throughput::Elements(10_000));
    let ks = keys(1, 10_000);
    group.bench_function("mutable_10k", |b| {
        b.iter_batched(
            MutableSet::new,
            |m| {
                for k in &ks {
                    m.add(k.clone());
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("counted_10k_x3", |b| {
        b.iter_batched(
            CountedSet::new,
            |m| {
                for _ in 0..3 {
                    for k in &ks {
                        m.add(k.clone());
                    }
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("set::query");
    group.throughput(Throughput::Elements(10_000));
    let present = keys(2, 10_000);
    let absent = keys(3, 10_000);
    let s = Set::from_objects(present.iter().cloned());
    group.bench_function("member_hit_10k", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for k in &present {
                hits += s.contains(k) as usize;
            }
            black_box(hits)
        })
    });
    group.bench_function("member_miss_10k", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for k in &absent {
                hits += s.contains(k) as usize;
            }
            black_box(hits)
        })
    });
    group.bench_function("enumerate_10k", |b| {
        b.iter(|| black_box(s.object_enumerator().count()))
    });
    group.finish();
}

fn bench_bulk(c: &mut Criterion) {
    let mut group = c.benchmark_group("set::bulk");
    let a = keys(4, 5_000);
    let other = Set::from_objects(keys(4, 2_500).into_iter().chain(keys(5, 2_500)));
    group.bench_function("intersect_5k", |b| {
        b.iter_batched(
            || MutableSet::from_objects(a.iter().cloned()),
            |m| {
                m.intersect_in_place(&other);
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("copy_5k", |b| {
        let m = MutableSet::from_objects(a.iter().cloned());
        b.iter(|| black_box(m.copy()))
    });
    group.finish();
}

fn bench_config() -> Criterion {
    Criterion::default()
}

criterion_group! {
    name = benches_set;
    config = bench_config();
    targets = bench_add,
              bench_query,
              bench_bulk
}
criterion_main!(benches_set);
