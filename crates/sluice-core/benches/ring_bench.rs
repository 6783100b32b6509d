//! Criterion benchmarks for the ring buffer.
//!
//! Measures the locked copy paths with a single thread, so the numbers show
//! per-call overhead rather than contention.
//!
//! Run with: cargo bench -p sluice-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sluice_core::{BufferData, RingBuffer, Trapdoor};

const CAPACITY: usize = 1 << 14;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024, 4096];

fn bench_scratch_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ring/scratch");
    for &block in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::new("commit_read", block), &block, |b, &block| {
            let ring = RingBuffer::new(CAPACITY, 1);
            let reader = ring.attach_reader();
            let t = Trapdoor::new();
            b.iter(|| {
                let mut view = ring.write_scratch(block, &t).unwrap();
                view.data_mut().fill(0.5);
                view.commit();
                black_box(ring.read(reader, block));
            });
        });
    }
    group.finish();
}

fn bench_copy_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ring/copy");
    for readers in [1usize, 4] {
        group.bench_with_input(BenchmarkId::new("readers", readers), &readers, |b, &readers| {
            let ring = RingBuffer::new(CAPACITY, 1);
            let ids: Vec<_> = (0..readers).map(|_| ring.attach_reader()).collect();
            let t = Trapdoor::new();
            let block = BufferData::zeroed(1024, 1);
            b.iter(|| {
                ring.write_copy(black_box(&block), &t).unwrap();
                for &id in &ids {
                    ring.skip(id, 1024);
                }
            });
        });
    }
    group.finish();
}

fn bench_plungers(c: &mut Criterion) {
    c.bench_function("Ring/plunger_skip", |b| {
        let ring = RingBuffer::new(CAPACITY, 1);
        let reader = ring.attach_reader();
        let t = Trapdoor::new();
        b.iter(|| {
            ring.write_copy(&BufferData::zeroed(16, 1), &t).unwrap();
            ring.insert_plunger(&t).unwrap();
            let n = ring.wait_ready(reader, 32, &t).unwrap();
            ring.skip(reader, n);
            ring.skip_plungers(reader, 1);
        });
    });
}

criterion_group!(benches, bench_scratch_round_trip, bench_copy_fan_out, bench_plungers);
criterion_main!(benches);
