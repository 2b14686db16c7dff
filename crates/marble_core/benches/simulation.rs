//! Simulation benchmarks for marble_core.
//!
//! Run with: `cargo bench -p marble_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use marble_test_utils::fixtures;

/// Tick a populated track for one simulated second.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("busy_track_120_ticks", |b| {
        b.iter(|| {
            let mut sim = fixtures::busy_track();
            for _ in 0..120 {
                black_box(sim.tick());
            }
            black_box(sim.state_hash())
        })
    });

    c.bench_function("state_hash", |b| {
        let mut sim = fixtures::busy_track();
        for _ in 0..600 {
            sim.tick();
        }
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
