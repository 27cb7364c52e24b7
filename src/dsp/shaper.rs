//! Wave shaper curves
//!
//! A wave shaper maps each input sample through a transfer function:
//!   output = f(input)
//!
//! Native graph engines do not call a closure per sample. They store the
//! function as a table of points spread evenly over the input range [-1, 1]
//! and interpolate between neighbours.
//!
//! # Curve Evaluation
//!
//!   v = (len - 1) / 2 * (x + 1)
//!   k = floor(v)
//!   f = v - k
//!
//!   v <= 0         -> curve[0]
//!   v >= len - 1   -> curve[len - 1]
//!   otherwise      -> (1 - f) * curve[k] + f * curve[k + 1]
//!
//! Inputs outside [-1, 1] therefore hold the end values of the curve.
//! Piecewise-linear mappings are reproduced exactly between their kinks;
//! everything else is approximated to within the point spacing.

/// Default number of points, enough for sub-0.2% spacing over [-1, 1]
pub const DEFAULT_CURVE_LEN: usize = 1024;

/// A sampled transfer function over [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ShaperCurve {
    points: Vec<f32>,
}

impl ShaperCurve {
    /// Sample `mapping` at `len` evenly spaced inputs in [-1, 1]
    ///
    /// `len` below 2 is raised to 2 so the curve always has two end points.
    pub fn from_mapping<F>(len: usize, mapping: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        let len = len.max(2);
        let last = (len - 1) as f32;
        let points = (0..len)
            .map(|i| mapping((i as f32 / last) * 2.0 - 1.0))
            .collect();

        Self { points }
    }

    /// Use explicit curve points; returns None for fewer than two points
    pub fn from_points(points: Vec<f32>) -> Option<Self> {
        (points.len() >= 2).then_some(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f32] {
        &self.points
    }

    /// Evaluate the curve at one input sample
    #[inline]
    pub fn apply(&self, sample: f32) -> f32 {
        let last = self.points.len() - 1;
        let v = last as f32 * 0.5 * (sample + 1.0);

        if v.is_nan() || v <= 0.0 {
            return self.points[0];
        }
        if v >= last as f32 {
            return self.points[last];
        }

        let k = v as usize;
        let f = v - k as f32;
        (1.0 - f) * self.points[k] + f * self.points[k + 1]
    }

    /// Shape a whole buffer in place
    pub fn process(&self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.apply(*sample);
        }
    }
}
