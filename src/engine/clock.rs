//! Virtual clock
//!
//! The clock owns the authoritative "now" of one context. It is either
//! hardware-sourced (follows a monotonic time source while started) or
//! synthetic (moves only when its owner calls [`VirtualClock::advance`]).
//!
//! # Tick increment
//!
//! A synthetic clock reports a tick increment of one render quantum:
//!
//!   tick_increment = 128 / sample_rate
//!
//!   44100 Hz -> 2.90 ms
//!   48000 Hz -> 2.67 ms
//!
//! This matches the block granularity the graph engine processes internally.
//! A hardware clock reports its update interval instead.

use std::cell::Cell;
use std::time::Instant;

use crate::{context::ContextMode, Error, Result, Seconds, RENDER_QUANTUM};

/// Where the clock reads its time from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Follows a monotonic wall-clock source
    Hardware,
    /// Advanced explicitly by the owner
    Synthetic,
}

/// A monotonic time source in seconds
///
/// Values must never decrease between calls. The clock additionally clamps
/// its own output, so a misbehaving source cannot move `now()` backwards.
pub trait MonotonicSource {
    fn seconds(&self) -> Seconds;
}

/// `Instant`-backed source used by realtime contexts
pub struct SystemMonotonic {
    origin: Instant,
}

impl SystemMonotonic {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicSource for SystemMonotonic {
    fn seconds(&self) -> Seconds {
        self.origin.elapsed().as_secs_f64()
    }
}

enum ClockSource {
    Hardware {
        source: Box<dyn MonotonicSource>,
        /// Source reading when the clock was last started (None = stopped)
        anchor: Option<Seconds>,
        /// Clock time accumulated before the last start
        accumulated: Seconds,
        /// Highest value handed out so far
        last: Cell<Seconds>,
    },
    Synthetic {
        current: Seconds,
    },
}

/// The clock owned by exactly one context
pub struct VirtualClock {
    sample_rate: u32,
    tick_increment: Seconds,
    source: ClockSource,
}

impl VirtualClock {
    /// Create a synthetic clock starting at zero
    pub fn synthetic(sample_rate: u32) -> Result<Self> {
        validate_sample_rate(sample_rate)?;

        Ok(Self {
            sample_rate,
            tick_increment: RENDER_QUANTUM as Seconds / sample_rate as Seconds,
            source: ClockSource::Synthetic { current: 0.0 },
        })
    }

    /// Create a stopped hardware clock over `source`
    pub fn hardware(
        sample_rate: u32,
        update_interval: Seconds,
        source: Box<dyn MonotonicSource>,
    ) -> Result<Self> {
        validate_sample_rate(sample_rate)?;
        if !(update_interval.is_finite() && update_interval > 0.0) {
            return Err(Error::InvalidConfig {
                field: "update_interval",
                reason: format!("must be a positive number of seconds, got {}", update_interval),
            });
        }

        Ok(Self {
            sample_rate,
            tick_increment: update_interval,
            source: ClockSource::Hardware {
                source,
                anchor: None,
                accumulated: 0.0,
                last: Cell::new(0.0),
            },
        })
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.source {
            ClockSource::Hardware { .. } => SourceKind::Hardware,
            ClockSource::Synthetic { .. } => SourceKind::Synthetic,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tick_increment(&self) -> Seconds {
        self.tick_increment
    }

    /// Current clock time
    ///
    /// Repeated calls without an intervening `advance` return the same value
    /// on a synthetic clock. On a hardware clock the value only moves while
    /// the clock is started.
    pub fn now(&self) -> Seconds {
        match &self.source {
            ClockSource::Synthetic { current } => *current,
            ClockSource::Hardware {
                source,
                anchor,
                accumulated,
                last,
            } => {
                let raw = match anchor {
                    Some(anchor) => accumulated + (source.seconds() - anchor).max(0.0),
                    None => *accumulated,
                };
                let now = raw.max(last.get());
                last.set(now);
                now
            }
        }
    }

    /// Move a synthetic clock forward by `delta` seconds, returning the new time
    pub fn advance(&mut self, delta: Seconds) -> Result<Seconds> {
        if !(delta.is_finite() && delta >= 0.0) {
            return Err(Error::InvalidTime(delta));
        }

        match &mut self.source {
            ClockSource::Synthetic { current } => {
                *current += delta;
                Ok(*current)
            }
            ClockSource::Hardware { .. } => Err(Error::InvalidMode {
                operation: "advance",
                mode: ContextMode::Realtime,
            }),
        }
    }

    /// Move a synthetic clock to the absolute time `time`
    ///
    /// Targets behind the current time leave the clock where it is.
    pub fn advance_to(&mut self, time: Seconds) -> Result<Seconds> {
        if !time.is_finite() {
            return Err(Error::InvalidTime(time));
        }

        match &mut self.source {
            ClockSource::Synthetic { current } => {
                *current = current.max(time);
                Ok(*current)
            }
            ClockSource::Hardware { .. } => Err(Error::InvalidMode {
                operation: "advance_to",
                mode: ContextMode::Realtime,
            }),
        }
    }

    /// Let hardware time flow. Starting a running clock does nothing.
    pub fn start(&mut self) -> Result<()> {
        match &mut self.source {
            ClockSource::Hardware { source, anchor, .. } => {
                if anchor.is_none() {
                    *anchor = Some(source.seconds());
                }
                Ok(())
            }
            ClockSource::Synthetic { .. } => Err(Error::InvalidMode {
                operation: "start",
                mode: ContextMode::Offline,
            }),
        }
    }

    /// Freeze hardware time at its current value
    pub fn stop(&mut self) {
        let now = self.now();
        if let ClockSource::Hardware {
            anchor,
            accumulated,
            ..
        } = &mut self.source
        {
            if anchor.take().is_some() {
                *accumulated = now;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.source,
            ClockSource::Hardware {
                anchor: Some(_),
                ..
            }
        )
    }
}

fn validate_sample_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(Error::InvalidConfig {
            field: "sample_rate",
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}
