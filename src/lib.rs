pub mod context; // Realtime/offline execution contexts
pub mod dsp;
pub mod engine; // Virtual clock and tick scheduler
pub mod error;
pub mod graph; // Boundary to the native graph engine
pub mod io;

pub use context::{Context, ContextMode, ContextOptions, ContextState};
pub use engine::{
    clock::{MonotonicSource, VirtualClock},
    scheduler::{EventScheduler, ListenerFailure, ListenerResult, SchedulerHandle, SubscriptionId},
};
pub use error::{Error, Result};

/// Time in seconds
pub type Seconds = f64;

/// Frames processed per block by the graph engine
pub const RENDER_QUANTUM: usize = 128;

/// Offline drain step; coarser than the render quantum on purpose, sample
/// placement below this resolution is left to the graph engine.
pub const OFFLINE_CATCH_UP_STEP: Seconds = 0.005;

/// Default spacing of realtime notification passes
pub const DEFAULT_UPDATE_INTERVAL: Seconds = 0.05;

/// Tolerance when comparing virtual timestamps
pub(crate) const TIME_EPSILON: Seconds = 1e-9;
