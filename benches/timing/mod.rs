//! Benchmarks for clock, scheduler and shaper.

mod drain;
mod scheduler;
mod shaper;

pub use drain::bench_drain;
pub use scheduler::bench_scheduler;
pub use shaper::bench_shaper;
