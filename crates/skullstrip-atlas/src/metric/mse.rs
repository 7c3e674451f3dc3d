//! Mean Squared Error metric implementation.

use skullstrip_core::transform::Transform;

use super::trait_::{utils, FixedSamples, Metric, MovingImage};
use crate::error::Result;

/// Mean Squared Error Metric.
///
/// MSE = (1/N) * sum((Fixed(x) - Moving(T(x)))^2)
///
/// over the `N` fixed samples whose mapped position lies inside the moving
/// image.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl MeanSquaredError {
    pub fn new() -> Self {
        Self
    }
}

impl Metric for MeanSquaredError {
    fn evaluate(
        &self,
        fixed: &FixedSamples,
        moving: &MovingImage<'_>,
        transform: &impl Transform<3>,
    ) -> Result<f64> {
        let (count, [sum]) = utils::accumulate(fixed, moving, transform, |f, m| {
            let diff = f - m;
            [diff * diff]
        })?;
        Ok(sum / count as f64)
    }

    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }
}
