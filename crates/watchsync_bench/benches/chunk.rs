//! Chunking benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use watchsync_bench::generate_snapshot;
use watchsync_protocol::{batch_size, chunk, RawSnapshot, Timestamp, WritePlan};

const NOW: Timestamp = 1_700_000_000_000;

/// Benchmark chunking batches with different value sizes.
fn bench_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk");

    for title_len in [16, 256, 2048].iter() {
        let batch = generate_snapshot(500, NOW, *title_len);
        group.throughput(Throughput::Bytes(batch_size(&batch) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(title_len), &batch, |b, batch| {
            b.iter(|| {
                let chunks = chunk(black_box(batch), 8000);
                black_box(chunks);
            });
        });
    }

    group.finish();
}

/// Benchmark computing a write plan between two large snapshots.
fn bench_write_plan(c: &mut Criterion) {
    let current = generate_snapshot(2_000, NOW, 32);
    let desired: RawSnapshot = current
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 10 != 0)
        .map(|(_, (k, v))| (k.clone(), v.clone()))
        .chain(generate_snapshot(200, NOW, 32).into_iter().map(|(k, v)| (format!("{k}x"), v)))
        .collect();

    c.bench_function("write_plan_2000", |b| {
        b.iter(|| {
            let plan = WritePlan::between(black_box(&current), black_box(&desired));
            black_box(plan);
        });
    });
}

criterion_group!(benches, bench_chunk, bench_write_plan);

criterion_main!(benches);
