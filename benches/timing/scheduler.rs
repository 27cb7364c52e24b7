//! Benchmarks for subscription bookkeeping.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_clock::EventScheduler;

pub fn bench_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing/scheduler");

    for &existing in &[0usize, 64, 1024] {
        let scheduler = EventScheduler::new();
        for _ in 0..existing {
            scheduler.subscribe(|_| Ok(()));
        }

        // subscribe + unsubscribe of the newest listener (tail of the list)
        group.bench_with_input(BenchmarkId::new("churn_tail", existing), &existing, |b, _| {
            b.iter(|| {
                let id = scheduler.subscribe(|_| Ok(()));
                black_box(scheduler.unsubscribe(black_box(id)))
            })
        });

        group.bench_with_input(BenchmarkId::new("one_shot", existing), &existing, |b, _| {
            b.iter(|| {
                let id = scheduler
                    .subscribe_at(black_box(1.0), |_| Ok(()))
                    .expect("valid time");
                black_box(scheduler.unsubscribe(id))
            })
        });
    }

    group.finish();
}
