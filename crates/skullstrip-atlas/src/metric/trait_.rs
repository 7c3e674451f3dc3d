//! Metric trait for image similarity measurement.
//!
//! Metrics compare the fixed (patient) image with the moving (atlas) image
//! mapped through a transform. Lower values indicate better alignment.

use nalgebra::Matrix3;
use skullstrip_core::image::VoxelGrid;
use skullstrip_core::interpolation::{Interpolator, LinearInterpolator};
use skullstrip_core::spatial::Point;
use skullstrip_core::transform::Transform;

use crate::error::{Result, StripError};

/// Metric trait for measuring dissimilarity between images.
pub trait Metric: Send + Sync {
    /// Dissimilarity of `fixed` and `moving ∘ transform`.
    ///
    /// Fails when too few fixed samples map inside the moving image.
    fn evaluate(
        &self,
        fixed: &FixedSamples,
        moving: &MovingImage<'_>,
        transform: &impl Transform<3>,
    ) -> Result<f64>;

    /// Get the name of this metric.
    fn name(&self) -> &'static str;
}

/// Fixed-image samples on a regular sub-grid.
///
/// Sampling is deterministic: every `stride`-th voxel along each axis,
/// in memory order, starting at index 0.
#[derive(Debug, Clone)]
pub struct FixedSamples {
    points: Vec<Point<3>>,
    values: Vec<f32>,
}

impl FixedSamples {
    pub fn from_grid(image: &VoxelGrid<f32>, stride: usize) -> Self {
        let stride = stride.max(1);
        let [nx, ny, nz] = image.shape();
        let capacity = nx.div_ceil(stride) * ny.div_ceil(stride) * nz.div_ceil(stride);
        let mut points = Vec::with_capacity(capacity);
        let mut values = Vec::with_capacity(capacity);
        for i in (0..nx).step_by(stride) {
            for j in (0..ny).step_by(stride) {
                for k in (0..nz).step_by(stride) {
                    let index = Point::new([i as f64, j as f64, k as f64]);
                    points.push(image.index_to_physical_point(&index));
                    values.push(image.data()[(i, j, k)]);
                }
            }
        }
        Self { points, values }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> &Point<3> {
        &self.points[index]
    }

    pub fn value(&self, index: usize) -> f32 {
        self.values[index]
    }
}

/// Moving image prepared for repeated physical-point lookups.
pub struct MovingImage<'a> {
    image: &'a VoxelGrid<f32>,
    to_index: Matrix3<f64>,
    interpolator: LinearInterpolator,
}

impl<'a> MovingImage<'a> {
    pub fn new(image: &'a VoxelGrid<f32>) -> Result<Self> {
        let to_index = image
            .metadata()
            .physical_to_index_matrix()
            .ok_or_else(|| StripError::transform("moving image direction is not invertible"))?;
        Ok(Self {
            image,
            to_index,
            interpolator: LinearInterpolator::new(),
        })
    }

    pub fn image(&self) -> &VoxelGrid<f32> {
        self.image
    }

    /// Linearly interpolated value at a physical point, `None` outside the buffer.
    #[inline]
    pub fn sample(&self, point: &Point<3>) -> Option<f32> {
        let offset = *point - *self.image.origin();
        let index = self.to_index * offset.0;
        self.interpolator.evaluate(self.image.data(), [index[0], index[1], index[2]])
    }
}

pub mod utils {
    //! Deterministic parallel accumulation over fixed samples.

    use rayon::prelude::*;

    use super::{FixedSamples, MovingImage};
    use crate::error::{Result, StripError};
    use skullstrip_core::transform::Transform;

    /// Samples per partial sum. Chunk boundaries never depend on the
    /// thread count, so results are bit-identical across runs.
    pub const CHUNK_SIZE: usize = 32768;

    /// A metric is only defined when at least this fraction of the fixed
    /// samples lands inside the moving image.
    pub const MIN_VALID_FRACTION: usize = 4;

    /// Per-chunk sums of `K` statistics over all fixed samples that map
    /// inside the moving image.
    ///
    /// `stats(fixed, moving)` returns the `K` quantities to add for one
    /// sample pair. Returns the number of contributing samples and the sums.
    pub fn accumulate<const K: usize, T, F>(
        fixed: &FixedSamples,
        moving: &MovingImage<'_>,
        transform: &T,
        stats: F,
    ) -> Result<(usize, [f64; K])>
    where
        T: Transform<3>,
        F: Fn(f64, f64) -> [f64; K] + Sync,
    {
        let n = fixed.len();
        let chunks = n.div_ceil(CHUNK_SIZE);
        let partials: Vec<(usize, [f64; K])> = (0..chunks)
            .into_par_iter()
            .map(|c| {
                let start = c * CHUNK_SIZE;
                let end = (start + CHUNK_SIZE).min(n);
                let mut count = 0usize;
                let mut sums = [0.0f64; K];
                for s in start..end {
                    let mapped = transform.transform_point(fixed.point(s));
                    if let Some(m) = moving.sample(&mapped) {
                        let terms = stats(fixed.value(s) as f64, m as f64);
                        for (acc, t) in sums.iter_mut().zip(terms) {
                            *acc += t;
                        }
                        count += 1;
                    }
                }
                (count, sums)
            })
            .collect();

        let mut count = 0usize;
        let mut sums = [0.0f64; K];
        for (c, partial) in partials {
            count += c;
            for (acc, p) in sums.iter_mut().zip(partial) {
                *acc += p;
            }
        }

        if count == 0 || count < n / MIN_VALID_FRACTION {
            return Err(StripError::metric(format!(
                "Too many samples map outside moving image buffer: {} / {}",
                count, n
            )));
        }
        Ok((count, sums))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skullstrip_core::image::ImageMetadata;
    use skullstrip_core::spatial::{Direction, Spacing, Vector};
    use skullstrip_core::transform::AffineTransform;

    #[test]
    fn test_fixed_samples_stride() {
        let metadata = ImageMetadata::new(Point::new([10.0, 0.0, 0.0]), Spacing::uniform(2.0), Direction::identity());
        let image = VoxelGrid::from_fn([5, 4, 3], metadata, |[i, j, k]| (i * 100 + j * 10 + k) as f32);
        let samples = FixedSamples::from_grid(&image, 2);
        assert_eq!(samples.len(), 3 * 2 * 2);
        assert_eq!(samples.value(0), 0.0);
        assert_eq!(samples.value(1), 2.0);
        assert_eq!(samples.point(1).to_array(), [10.0, 0.0, 4.0]);
        assert_eq!(FixedSamples::from_grid(&image, 1).len(), 60);
    }

    #[test]
    fn test_moving_image_sample_physical() {
        let metadata = ImageMetadata::new(Point::new([-4.0, 0.0, 0.0]), Spacing::uniform(2.0), Direction::identity());
        let image = VoxelGrid::from_fn([5, 5, 5], metadata, |[i, _, _]| i as f32);
        let moving = MovingImage::new(&image).unwrap();
        assert_eq!(moving.sample(&Point::new([-4.0, 0.0, 0.0])), Some(0.0));
        assert!((moving.sample(&Point::new([-1.0, 2.0, 2.0])).unwrap() - 1.5).abs() < 1e-6);
        assert_eq!(moving.sample(&Point::new([100.0, 0.0, 0.0])), None);
    }

    #[test]
    fn test_accumulate_rejects_disjoint_images() {
        let image = VoxelGrid::from_elem([4, 4, 4], 1.0f32, ImageMetadata::default());
        let fixed = FixedSamples::from_grid(&image, 1);
        let moving = MovingImage::new(&image).unwrap();
        let far = AffineTransform::new(
            nalgebra::Matrix3::identity(),
            Vector::new([1000.0, 0.0, 0.0]),
            Point::origin(),
        );
        let err = utils::accumulate::<1, _, _>(&fixed, &moving, &far, |f, m| [f - m]).unwrap_err();
        assert!(matches!(err, StripError::Metric(_)));

        let identity = AffineTransform::identity(Point::origin());
        let (count, sums) = utils::accumulate::<2, _, _>(&fixed, &moving, &identity, |f, m| [f, m]).unwrap();
        assert_eq!(count, 64);
        assert_eq!(sums, [64.0, 64.0]);
    }
}
