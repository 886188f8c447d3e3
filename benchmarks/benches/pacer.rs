// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks the pacer's poll step across target rates.

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::time::Duration;
use vajrapulse_engine::pacer::Pacer;

fn bench_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("pacer");

    for rate in [100.0, 10_000.0, 1_000_000.0] {
        let _ = group.bench_with_input(
            BenchmarkId::new("poll", rate as u64),
            &rate,
            |b, &rate| {
                let mut pacer = Pacer::new();
                let mut tick = 0u64;
                b.iter(|| {
                    tick += 1;
                    std::hint::black_box(pacer.poll(Duration::from_micros(tick * 100), rate))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_poll);
criterion_main!(benches);
