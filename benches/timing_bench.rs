//! Benchmarks for the timing core.
//!
//! Run with: cargo bench
//!
//! An offline render drains one notification pass per 5 ms of audio before
//! the graph renders, so drain cost scales with duration x listeners:
//!
//!   1 s  -> 201 passes
//!   10 s -> 2001 passes
//!
//! Benchmark groups:
//!   - timing/drain      Offline render, schedule drain included
//!   - timing/scheduler  Subscription churn
//!   - timing/shaper     Waveshaper curve lookup per block

use criterion::{criterion_group, criterion_main};

mod timing;

/// Common buffer sizes used in audio applications.
pub const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

criterion_group!(
    benches,
    timing::bench_drain,
    timing::bench_scheduler,
    timing::bench_shaper,
);
criterion_main!(benches);
