//! Stateless per-sample mappings consumed by the graph.
//!
//! These are leaf consumers of `create_shaper`: they describe a transfer
//! curve and never schedule anything themselves.

/// Range conversions between gain and audio signals.
pub mod range;
/// Sampled transfer curves evaluated like a native wave shaper.
pub mod shaper;

pub use shaper::ShaperCurve;
