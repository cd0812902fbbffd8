use core::hint::black_box;
use cosid::{
    AtomicSnowflakeGenerator, BitAllocation, IdConverter, LockSnowflakeGenerator, Poll,
    RadixIdConverter, SnowflakeGenerator, SnowflakeIdStateParser, SnowflakeLayout, SystemClock,
    TimeSource, TimeUnit, UNIX_EPOCH,
};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

struct FixedMockTime {
    millis: u64,
}

impl TimeSource for FixedMockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

const BENCH_LAYOUT: SnowflakeLayout =
    SnowflakeLayout::new(BitAllocation::MILLISECOND, UNIX_EPOCH, TimeUnit::Millisecond);

// Number of IDs generated per benchmark iteration. Matches the sequence space
// of the millisecond layout so the fixed clock never exhausts it.
const TOTAL_IDS: usize = 4096;

/// Benchmarks a hot-path generator where IDs are always `Ready`.
fn bench_generator<G>(c: &mut Criterion, group_name: &str, generator_factory: impl Fn() -> G)
where
    G: SnowflakeGenerator,
{
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    match generator.try_poll_id() {
                        Ok(Poll::Ready { id }) => {
                            black_box(id);
                        }
                        Ok(Poll::Pending { .. }) | Err(_) => unreachable!(),
                    }
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks a generator on the system clock, yielding on `Pending`.
fn bench_generator_yield<G>(c: &mut Criterion, group_name: &str, generator_factory: impl Fn() -> G)
where
    G: SnowflakeGenerator,
{
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.generate().unwrap());
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks a shared generator across threads, yielding on `Pending`.
fn bench_generator_contended<G>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> G,
) where
    G: SnowflakeGenerator + Send + Sync,
{
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8, 16] {
        if thread_count > num_cpus::get() * 2 {
            break;
        }
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{TOTAL_IDS}/threads/{thread_count}"),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let generator = Arc::new(generator_factory());
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let generator = Arc::clone(&generator);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        loop {
                                            match generator.try_poll_id().unwrap() {
                                                Poll::Ready { id } => {
                                                    black_box(id);
                                                    break;
                                                }
                                                Poll::Pending { .. } => {
                                                    std::thread::yield_now()
                                                }
                                            }
                                        }
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_mock_sequential_lock(c: &mut Criterion) {
    bench_generator(c, "mock/sequential/lock", || {
        LockSnowflakeGenerator::new(BENCH_LAYOUT, 1, FixedMockTime { millis: 1 }).unwrap()
    });
}

fn benchmark_mock_sequential_atomic(c: &mut Criterion) {
    bench_generator(c, "mock/sequential/atomic", || {
        AtomicSnowflakeGenerator::new(BENCH_LAYOUT, 1, FixedMockTime { millis: 1 }).unwrap()
    });
}

fn benchmark_system_sequential_lock(c: &mut Criterion) {
    bench_generator_yield(c, "system/sequential/lock", || {
        LockSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock).unwrap()
    });
}

fn benchmark_system_sequential_atomic(c: &mut Criterion) {
    bench_generator_yield(c, "system/sequential/atomic", || {
        AtomicSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock).unwrap()
    });
}

fn benchmark_system_contended_lock(c: &mut Criterion) {
    bench_generator_contended(c, "system/contended/lock", || {
        LockSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock).unwrap()
    });
}

fn benchmark_system_contended_atomic(c: &mut Criterion) {
    bench_generator_contended(c, "system/contended/atomic", || {
        AtomicSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock).unwrap()
    });
}

fn benchmark_radix(c: &mut Criterion) {
    let mut group = c.benchmark_group("converter/radix");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for (name, converter) in [
        ("base62", RadixIdConverter::base62(true)),
        ("base36", RadixIdConverter::base36(true)),
        ("crockford32", RadixIdConverter::crockford32(true)),
    ] {
        let encoded: Vec<String> = (0..TOTAL_IDS as u64)
            .map(|n| converter.encode(n.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 1).unwrap())
            .collect();

        group.bench_function(format!("{name}/encode/elems/{TOTAL_IDS}"), |b| {
            b.iter(|| {
                for n in 0..TOTAL_IDS as u64 {
                    black_box(converter.encode(black_box(n << 20)).unwrap());
                }
            });
        });
        group.bench_function(format!("{name}/decode/elems/{TOTAL_IDS}"), |b| {
            b.iter(|| {
                for s in &encoded {
                    black_box(converter.decode(black_box(s)).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_friendly(c: &mut Criterion) {
    let parser = SnowflakeIdStateParser::new(SnowflakeLayout::MILLISECOND);
    let allocation = SnowflakeLayout::MILLISECOND.allocation();
    let ids: Vec<u64> = (0..TOTAL_IDS as u64)
        .map(|n| allocation.pack(200_000_000_000 + n, n % 1024, n % 4096))
        .collect();
    let friendly: Vec<String> = ids
        .iter()
        .map(|&id| parser.parse(id).unwrap().friendly_id)
        .collect();

    let mut group = c.benchmark_group("friendly");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));
    group.bench_function(format!("parse/elems/{TOTAL_IDS}"), |b| {
        b.iter(|| {
            for &id in &ids {
                black_box(parser.parse(black_box(id)).unwrap());
            }
        });
    });
    group.bench_function(format!("parse_friendly_id/elems/{TOTAL_IDS}"), |b| {
        b.iter(|| {
            for s in &friendly {
                black_box(parser.parse_friendly_id(black_box(s)).unwrap());
            }
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    // Mock clock
    benchmark_mock_sequential_lock,
    benchmark_mock_sequential_atomic,
    // System clock
    benchmark_system_sequential_lock,
    benchmark_system_sequential_atomic,
    benchmark_system_contended_lock,
    benchmark_system_contended_atomic,
    // Converters
    benchmark_radix,
    benchmark_friendly,
);
criterion_main!(benches);
