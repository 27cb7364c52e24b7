//! Timing primitives shared by both context modes.

/// Hardware-sourced and synthetic clocks.
pub mod clock;
/// Tick-granular listener bus with isolated failures.
pub mod scheduler;

pub use clock::{MonotonicSource, SourceKind, SystemMonotonic, VirtualClock};
pub use scheduler::{EventScheduler, ListenerFailure, ListenerResult, SchedulerHandle, SubscriptionId};
