use std::hint::black_box;
use std::sync::Arc;

use centroid::{compute_statistics, Accumulator, AccumulatorConfig, VectorBatch};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use store::{InMemoryStore, RedbStore};

const DIM: usize = 16;

fn rows(count: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|i| (0..DIM).map(|j| (i * DIM + j) as f64 * 0.5).collect())
        .collect()
}

/// Batch validation plus mean/stdev over increasing batch sizes
fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");
    for size in [1usize, 64, 1024, 16_384] {
        let batch = VectorBatch::new(rows(size), DIM).unwrap();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| compute_statistics(black_box(batch)))
        });
    }
    group.finish();
}

/// End-to-end ingest, including load and compare-and-store, per backend
fn bench_ingest(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let backends = [
        (
            "in_memory",
            Accumulator::new(Arc::new(InMemoryStore::new()), AccumulatorConfig::new(DIM)).unwrap(),
        ),
        (
            "redb",
            Accumulator::new(
                Arc::new(RedbStore::open(dir.path().join("bench.redb"), "bench").unwrap()),
                AccumulatorConfig::new(DIM),
            )
            .unwrap(),
        ),
    ];

    let mut group = c.benchmark_group("ingest");
    for (name, accumulator) in &backends {
        runtime.block_on(accumulator.initialize()).unwrap();
        let batch = VectorBatch::new(rows(64), DIM).unwrap();
        group.throughput(Throughput::Elements(64));
        group.bench_function(*name, |b| {
            b.iter(|| {
                runtime
                    .block_on(accumulator.ingest_batch(black_box(&batch)))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_statistics, bench_ingest);
criterion_main!(benches);
