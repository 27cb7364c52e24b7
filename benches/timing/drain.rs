//! Benchmarks for offline schedule draining.

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion};
use saavy_clock::{graph::SoftwareGraph, Context};

const SAMPLE_RATE: u32 = 48_000;

fn context(duration: f64, listeners: usize) -> Context {
    let mut ctx = Context::offline(1, duration, SAMPLE_RATE, Box::new(SoftwareGraph::new(SAMPLE_RATE)))
        .expect("valid offline context");
    for _ in 0..listeners {
        let mut acc = 0.0;
        ctx.on_tick(move |time| {
            acc += black_box(time);
            Ok(())
        });
    }
    // one-shot callbacks spread over the timeline, one per beat at 120 bpm
    let mut at = 0.0;
    while at <= duration {
        ctx.schedule_at(at, |time| {
            black_box(time);
            Ok(())
        })
        .expect("valid time");
        at += 0.5;
    }
    ctx
}

pub fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing/drain");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime");

    for &listeners in &[1usize, 16, 128] {
        group.bench_with_input(BenchmarkId::new("1s", listeners), &listeners, |b, &n| {
            b.iter_batched(
                || context(1.0, n),
                |mut ctx| runtime.block_on(ctx.render()).map(|buffer| buffer.len()),
                BatchSize::SmallInput,
            )
        });
    }

    group.bench_function("10s_empty", |b| {
        b.iter_batched(
            || context(10.0, 0),
            |mut ctx| runtime.block_on(ctx.render()).map(|buffer| buffer.len()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}
