//! Signal range conversion
//!
//! Gain-style control signals live in the normal range [0, 1]; audio-rate
//! signals live in [-1, 1]. Converting between them is a fixed per-sample
//! mapping, so both directions are plain shaper curves.
//!
//!   gain_to_audio:  f(x) = |x| * 2 - 1     [0, 1]  -> [-1, 1]
//!   audio_to_gain:  f(x) = (x + 1) / 2     [-1, 1] -> [0, 1]

use super::shaper::{ShaperCurve, DEFAULT_CURVE_LEN};

/// Map a normal-range sample to audio range
#[inline]
pub fn gain_to_audio_sample(sample: f32) -> f32 {
    sample.abs() * 2.0 - 1.0
}

/// Map an audio-range sample to normal range
#[inline]
pub fn audio_to_gain_sample(sample: f32) -> f32 {
    (sample + 1.0) * 0.5
}

/// Curve for [`gain_to_audio_sample`]
pub fn gain_to_audio() -> ShaperCurve {
    ShaperCurve::from_mapping(DEFAULT_CURVE_LEN, gain_to_audio_sample)
}

/// Curve for [`audio_to_gain_sample`]
pub fn audio_to_gain() -> ShaperCurve {
    ShaperCurve::from_mapping(DEFAULT_CURVE_LEN, audio_to_gain_sample)
}
