//! Normalized Cross Correlation metric implementation.

use skullstrip_core::transform::Transform;

use super::trait_::{utils, FixedSamples, Metric, MovingImage};
use crate::error::Result;

/// Normalized Cross Correlation Metric.
///
/// Returns `-NCC` so that lower values mean better alignment:
///
/// NCC = Σ(f - f̄)(m - m̄) / sqrt(Σ(f - f̄)² · Σ(m - m̄)²)
///
/// When either image is constant over the overlap the correlation is
/// undefined and the metric evaluates to `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedCrossCorrelation;

impl NormalizedCrossCorrelation {
    pub fn new() -> Self {
        Self
    }
}

impl Metric for NormalizedCrossCorrelation {
    fn evaluate(
        &self,
        fixed: &FixedSamples,
        moving: &MovingImage<'_>,
        transform: &impl Transform<3>,
    ) -> Result<f64> {
        let (count, [sf, sm, sff, smm, sfm]) =
            utils::accumulate(fixed, moving, transform, |f, m| [f, m, f * f, m * m, f * m])?;
        let n = count as f64;
        let cov = sfm - sf * sm / n;
        let var_f = sff - sf * sf / n;
        let var_m = smm - sm * sm / n;
        let denom = (var_f * var_m).sqrt();
        if !(denom > f64::EPSILON) {
            return Ok(0.0);
        }
        Ok(-(cov / denom))
    }

    fn name(&self) -> &'static str {
        "NormalizedCrossCorrelation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skullstrip_core::image::{ImageMetadata, VoxelGrid};
    use skullstrip_core::spatial::Point;
    use skullstrip_core::transform::AffineTransform;

    #[test]
    fn test_ncc_is_intensity_affine_invariant() {
        let fixed_image = VoxelGrid::from_fn([8, 8, 8], ImageMetadata::default(), |[i, j, k]| (i * j + k) as f32);
        let moving_image = fixed_image.map(|v| 3.0 * v + 10.0);
        let fixed = FixedSamples::from_grid(&fixed_image, 1);
        let moving = MovingImage::new(&moving_image).unwrap();
        let value = NormalizedCrossCorrelation::new()
            .evaluate(&fixed, &moving, &AffineTransform::identity(Point::origin()))
            .unwrap();
        assert!((value + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ncc_constant_image_is_zero() {
        let fixed_image = VoxelGrid::from_fn([4, 4, 4], ImageMetadata::default(), |[i, _, _]| i as f32);
        let moving_image = VoxelGrid::from_elem([4, 4, 4], 5.0f32, ImageMetadata::default());
        let fixed = FixedSamples::from_grid(&fixed_image, 1);
        let moving = MovingImage::new(&moving_image).unwrap();
        let value = NormalizedCrossCorrelation::new()
            .evaluate(&fixed, &moving, &AffineTransform::identity(Point::origin()))
            .unwrap();
        assert_eq!(value, 0.0);
    }
}
