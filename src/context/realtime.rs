//! Realtime strategy
//!
//! Time comes from a hardware-sourced [`VirtualClock`]. Nothing runs on its
//! own: the owner calls `poll()` from its loop (or a device callback) and a
//! notification pass fires whenever the clock has crossed the next update
//! boundary. A slow poller gets one pass at the current time, not a burst of
//! catch-up passes.

use super::{ContextMode, ContextState, TimingStrategy};
use crate::{
    engine::{EventScheduler, ListenerFailure, MonotonicSource, VirtualClock},
    graph::GraphPrimitiveProvider,
    Error, Result, Seconds, TIME_EPSILON,
};

pub struct RealtimeStrategy {
    clock: VirtualClock,
    state: ContextState,
    /// Earliest clock time of the next pass (None until first resumed)
    next_pass: Option<Seconds>,
}

impl RealtimeStrategy {
    pub fn new(
        sample_rate: u32,
        update_interval: Seconds,
        source: Box<dyn MonotonicSource>,
    ) -> Result<Self> {
        Ok(Self {
            clock: VirtualClock::hardware(sample_rate, update_interval, source)?,
            state: ContextState::Suspended,
            next_pass: None,
        })
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }
}

impl TimingStrategy for RealtimeStrategy {
    fn mode(&self) -> ContextMode {
        ContextMode::Realtime
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn now(&self) -> Seconds {
        self.clock.now()
    }

    fn tick_increment(&self) -> Seconds {
        self.clock.tick_increment()
    }

    fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(Error::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                self.clock.start()?;
                self.state = ContextState::Running;
                if self.next_pass.is_none() {
                    self.next_pass = Some(self.clock.now());
                }
                tracing::debug!(now = self.clock.now(), "realtime context running");
                Ok(())
            }
        }
    }

    fn suspend(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(Error::Closed),
            ContextState::Suspended => Ok(()),
            ContextState::Running => {
                self.clock.stop();
                self.state = ContextState::Suspended;
                tracing::debug!(now = self.clock.now(), "realtime context suspended");
                Ok(())
            }
        }
    }

    fn poll(&mut self, scheduler: &EventScheduler, failures: &mut Vec<ListenerFailure>) -> usize {
        if self.state != ContextState::Running {
            return 0;
        }

        let now = self.clock.now();
        match self.next_pass {
            Some(due) if now + TIME_EPSILON < due => 0,
            _ => {
                failures.extend(scheduler.notify_all(now));
                self.next_pass = Some(now + self.clock.tick_increment());
                1
            }
        }
    }

    fn close(&mut self, graph: &mut dyn GraphPrimitiveProvider) -> Result<()> {
        if self.state == ContextState::Closed {
            return Ok(());
        }

        self.clock.stop();
        self.state = ContextState::Closed;
        graph.close()?;
        tracing::debug!(now = self.clock.now(), "realtime context closed");
        Ok(())
    }
}
