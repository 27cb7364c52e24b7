//! Offline render driver
//!
//! Offline contexts have no hardware clock. Rendering is split in two steps:
//!
//! 1. Drain: step a synthetic clock from zero to the end of the job and run
//!    one notification pass per step. Everything scheduled against the
//!    context fires here, synchronously, with no yield points.
//! 2. Native render: hand the fully scheduled graph to the provider once.
//!
//! # Pass count
//!
//!   passes = ceil(duration / step) + 1
//!
//!   duration = 0.02, step = 0.005  ->  5 passes at 0, 0.005, 0.01, 0.015, 0.02
//!   duration = 0.021, step = 0.005 ->  6 passes, the last at 0.025
//!
//! The count is fixed before the first pass, so draining terminates even with
//! no listeners and even if a listener misbehaves. Pass `k` runs at exactly
//! `k * step`, which makes the `(listener, time)` sequence a pure function of
//! duration and step.
//!
//! # States
//!
//!   Idle ──render()──→ Draining ──ok──→ Rendered
//!                          │
//!                          └──native failure──→ Failed
//!
//! Rendered and Failed are terminal: the schedule has been consumed and the
//! clock cannot be rewound.

use super::{ContextMode, ContextState, TimingStrategy};
use crate::{
    engine::{EventScheduler, ListenerFailure, VirtualClock},
    graph::{GraphPrimitiveProvider, RenderedBuffer},
    Error, Result, Seconds, TIME_EPSILON,
};

/// Upper bound on rendered frames per channel and on drain passes
pub const MAX_RENDER_FRAMES: usize = i32::MAX as usize;

/// Parameters of one offline render, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderJob {
    duration_seconds: Seconds,
    channel_count: u16,
    sample_rate: u32,
}

impl RenderJob {
    pub fn new(duration_seconds: Seconds, channel_count: u16, sample_rate: u32) -> Result<Self> {
        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return Err(Error::InvalidConfig {
                field: "duration_seconds",
                reason: format!("must be a positive number of seconds, got {}", duration_seconds),
            });
        }
        if channel_count == 0 {
            return Err(Error::InvalidConfig {
                field: "channel_count",
                reason: "must be greater than zero".into(),
            });
        }
        if sample_rate == 0 {
            return Err(Error::InvalidConfig {
                field: "sample_rate",
                reason: "must be greater than zero".into(),
            });
        }
        if duration_seconds * sample_rate as Seconds > MAX_RENDER_FRAMES as Seconds {
            return Err(Error::InvalidConfig {
                field: "duration_seconds",
                reason: format!(
                    "{} s at {} Hz exceeds {} frames",
                    duration_seconds, sample_rate, MAX_RENDER_FRAMES
                ),
            });
        }

        Ok(Self {
            duration_seconds,
            channel_count,
            sample_rate,
        })
    }

    pub fn duration_seconds(&self) -> Seconds {
        self.duration_seconds
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per channel in the rendered buffer
    pub fn frame_count(&self) -> usize {
        (self.duration_seconds * self.sample_rate as Seconds).round() as usize
    }
}

/// Lifecycle of an offline render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Draining,
    Rendered,
    Failed,
}

impl DriverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DriverState::Rendered | DriverState::Failed)
    }
}

/// Drains the schedule for one [`RenderJob`], then delegates the render
pub struct OfflineRenderDriver {
    job: RenderJob,
    clock: VirtualClock,
    step: Seconds,
    state: DriverState,
}

impl OfflineRenderDriver {
    pub fn new(job: RenderJob, step: Seconds) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::InvalidConfig {
                field: "catch_up_step",
                reason: format!("must be a positive number of seconds, got {}", step),
            });
        }
        if job.duration_seconds() / step > MAX_RENDER_FRAMES as Seconds {
            return Err(Error::InvalidConfig {
                field: "catch_up_step",
                reason: format!("{} s is too fine for a {} s render", step, job.duration_seconds()),
            });
        }

        Ok(Self {
            clock: VirtualClock::synthetic(job.sample_rate())?,
            job,
            step,
            state: DriverState::Idle,
        })
    }

    pub fn job(&self) -> &RenderJob {
        &self.job
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn now(&self) -> Seconds {
        self.clock.now()
    }

    pub fn step(&self) -> Seconds {
        self.step
    }

    /// Number of notification passes a render will run
    ///
    /// At least one step follows the pass at zero, so the last pass is never
    /// earlier than the duration by more than `TIME_EPSILON`.
    pub fn pass_count(&self) -> u64 {
        let steps = (self.job.duration_seconds() / self.step - TIME_EPSILON).ceil();
        steps.max(1.0) as u64 + 1
    }

    /// Drain the schedule and render the graph; valid once
    pub fn render(
        &mut self,
        scheduler: &EventScheduler,
        graph: &mut dyn GraphPrimitiveProvider,
        failures: &mut Vec<ListenerFailure>,
    ) -> Result<RenderedBuffer> {
        if self.state != DriverState::Idle {
            return Err(Error::TerminalState(self.state));
        }

        self.state = DriverState::Draining;
        let passes = self.pass_count();
        if let Err(err) = self.drain(passes, scheduler, failures) {
            self.state = DriverState::Failed;
            return Err(err);
        }
        tracing::debug!(
            passes,
            listener_failures = failures.len(),
            end = self.clock.now(),
            "offline schedule drained"
        );

        match graph.start_rendering(&self.job) {
            Ok(buffer) => {
                self.state = DriverState::Rendered;
                tracing::debug!(frames = buffer.len(), "offline render complete");
                Ok(buffer)
            }
            Err(err) => {
                self.state = DriverState::Failed;
                tracing::warn!(error = %err, "native render failed");
                Err(Error::NativeRenderFailure(err))
            }
        }
    }

    fn drain(
        &mut self,
        passes: u64,
        scheduler: &EventScheduler,
        failures: &mut Vec<ListenerFailure>,
    ) -> Result<()> {
        for index in 0..passes {
            self.clock.advance_to(index as Seconds * self.step)?;
            failures.extend(scheduler.notify_all(self.clock.now()));
        }
        self.clock.advance_to(passes as Seconds * self.step)?;
        Ok(())
    }
}

/// Offline side of the context: synthetic time, one render, no suspend
pub struct OfflineStrategy {
    driver: OfflineRenderDriver,
    closed: bool,
}

impl OfflineStrategy {
    pub fn new(job: RenderJob, step: Seconds) -> Result<Self> {
        Ok(Self {
            driver: OfflineRenderDriver::new(job, step)?,
            closed: false,
        })
    }

    pub fn driver(&self) -> &OfflineRenderDriver {
        &self.driver
    }
}

impl TimingStrategy for OfflineStrategy {
    fn mode(&self) -> ContextMode {
        ContextMode::Offline
    }

    fn state(&self) -> ContextState {
        match self.driver.state() {
            _ if self.closed => ContextState::Closed,
            DriverState::Idle => ContextState::Suspended,
            DriverState::Draining => ContextState::Running,
            DriverState::Rendered | DriverState::Failed => ContextState::Closed,
        }
    }

    fn now(&self) -> Seconds {
        self.driver.now()
    }

    fn tick_increment(&self) -> Seconds {
        self.driver.clock().tick_increment()
    }

    /// The whole timeline is consumed by `render`, there is nothing to resume
    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        Err(Error::InvalidMode {
            operation: "suspend",
            mode: ContextMode::Offline,
        })
    }

    fn poll(&mut self, _scheduler: &EventScheduler, _failures: &mut Vec<ListenerFailure>) -> usize {
        0
    }

    /// No hardware to release; an unrendered job is simply abandoned
    fn close(&mut self, _graph: &mut dyn GraphPrimitiveProvider) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn render(
        &mut self,
        scheduler: &EventScheduler,
        graph: &mut dyn GraphPrimitiveProvider,
        failures: &mut Vec<ListenerFailure>,
    ) -> Result<RenderedBuffer> {
        if self.driver.state().is_terminal() {
            return Err(Error::TerminalState(self.driver.state()));
        }
        if self.closed {
            return Err(Error::Closed);
        }
        self.driver.render(scheduler, graph, failures)
    }
}
