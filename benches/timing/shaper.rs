//! Benchmarks for waveshaper curve lookup.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_clock::dsp::range;

use crate::BLOCK_SIZES;

pub fn bench_shaper(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing/shaper");
    let curve = range::gain_to_audio();

    for &size in BLOCK_SIZES {
        // ramp over the full input range, including the clamped edges
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.4 - 1.2)
            .collect();
        let mut buffer = input.clone();

        group.bench_with_input(BenchmarkId::new("gain_to_audio", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                curve.process(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
