//! Clock acquisition costs: the production timestamp against the raw OS
//! monotonic read and std's Instant. perf_report reads the resulting
//! criterion JSON for its display.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use metron_clock::Timestamp;
use metron_perf::mono_now_ns;
use std::time::Instant;

fn bench_clock(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock");

    group.bench_function("timestamp_now", |b| {
        b.iter(|| black_box(Timestamp::now()));
    });

    group.bench_function("mono_now_ns", |b| {
        b.iter(|| black_box(mono_now_ns()));
    });

    group.bench_function("instant_now", |b| {
        b.iter(|| black_box(Instant::now()));
    });

    group.bench_function("elapsed_pair", |b| {
        b.iter(|| {
            let start = Timestamp::now();
            black_box(Timestamp::now().ms_since(start));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_clock);
criterion_main!(benches);
