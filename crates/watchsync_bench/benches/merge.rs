//! Merge benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use watchsync_bench::{generate_pair, DAY_MS};
use watchsync_protocol::{MergePolicy, RecentWindow, Snapshot, Timestamp};

const NOW: Timestamp = 1_700_000_000_000;

/// Benchmark a full merge at increasing store sizes.
fn bench_full_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_full");
    let policy = MergePolicy::default();

    for count in [100, 1_000, 5_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let (local, remote) = generate_pair(count, 0.8, NOW);
            b.iter(|| {
                let outcome = policy.merge(black_box(&local), black_box(&remote), NOW, NOW - 60_000);
                black_box(outcome);
            });
        });
    }

    group.finish();
}

/// Benchmark the staleness fail-safe path.
fn bench_fail_safe(c: &mut Criterion) {
    let policy = MergePolicy::default();
    let (local, remote) = generate_pair(1_000, 0.8, NOW);

    c.bench_function("merge_fail_safe_1000", |b| {
        b.iter(|| {
            let outcome =
                policy.merge(black_box(&local), black_box(&remote), NOW, NOW - 30 * DAY_MS);
            black_box(outcome);
        });
    });
}

/// Benchmark window selection plus merge, as an incremental cycle runs it.
fn bench_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_incremental");
    let policy = MergePolicy::default();

    for count in [1_000, 5_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let (local, remote) = generate_pair(count, 0.8, NOW);
            let local = Snapshot::parse(&local);
            let remote = Snapshot::parse_remote(&remote, &policy.namespace);
            let since = NOW - 15 * 60 * 1000;

            b.iter(|| {
                let window = RecentWindow::select(black_box(&local), black_box(&remote), since);
                let outcome = policy.merge_snapshots(&window.local, &window.remote, NOW, since);
                black_box(outcome);
            });
        });
    }

    group.finish();
}

/// Benchmark snapshot parsing.
fn bench_parse(c: &mut Criterion) {
    let (local, _) = generate_pair(5_000, 0.0, NOW);

    c.bench_function("snapshot_parse_5000", |b| {
        b.iter(|| {
            let snapshot = Snapshot::parse(black_box(&local));
            black_box(snapshot);
        });
    });
}

criterion_group!(
    benches,
    bench_full_merge,
    bench_fail_safe,
    bench_incremental,
    bench_parse,
);

criterion_main!(benches);
