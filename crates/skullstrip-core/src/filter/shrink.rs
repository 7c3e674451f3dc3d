use ndarray::{s, Array3, Zip};

use crate::image::{ImageMetadata, VoxelGrid};
use crate::spatial::{Point, Spacing};

/// Shrink filter.
///
/// Reduces the image size by integer factors, averaging each block of
/// `factor` voxels per axis. Spacing grows by the factor and the origin
/// moves to the centre of the first block so physical extents line up.
#[derive(Debug, Clone)]
pub struct ShrinkImageFilter {
    factors: [usize; 3],
}

impl ShrinkImageFilter {
    /// Create a new shrink filter.
    ///
    /// # Arguments
    /// * `factors` - Shrink factor for each dimension. Zero is treated as one.
    pub fn new(factors: [usize; 3]) -> Self {
        Self {
            factors: factors.map(|f| f.max(1)),
        }
    }

    /// Same factor along every axis.
    pub fn uniform(factor: usize) -> Self {
        Self::new([factor; 3])
    }

    pub fn factors(&self) -> [usize; 3] {
        self.factors
    }

    /// Apply the filter to an image.
    pub fn apply(&self, image: &VoxelGrid<f32>) -> VoxelGrid<f32> {
        if self.factors == [1, 1, 1] {
            return image.clone();
        }

        let input_size = image.shape();
        let f = self.factors;
        let size: [usize; 3] = std::array::from_fn(|d| (input_size[d] / f[d]).max(1));

        let source = image.data();
        let mut data = Array3::<f32>::zeros((size[0], size[1], size[2]));
        Zip::indexed(&mut data).par_for_each(|(i, j, k), value| {
            let lo = [i * f[0], j * f[1], k * f[2]];
            let hi: [usize; 3] = std::array::from_fn(|d| (lo[d] + f[d]).min(input_size[d]));
            let block = source.slice(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]]);
            let mut sum = 0.0f64;
            for &v in block.iter() {
                sum += v as f64;
            }
            *value = (sum / block.len().max(1) as f64) as f32;
        });

        let first_block_center = Point::new(std::array::from_fn(|d| (f[d].min(input_size[d]) as f64 - 1.0) / 2.0));
        let origin = image.index_to_physical_point(&first_block_center);
        let spacing = Spacing::new(std::array::from_fn(|d| image.spacing()[d] * f[d] as f64));
        let metadata = ImageMetadata::new(origin, spacing, *image.direction());

        VoxelGrid::new(data, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction3, Point3, Spacing3};

    #[test]
    fn test_shrink_averages_blocks() {
        let image = VoxelGrid::from_fn([4, 4, 2], ImageMetadata::default(), |[i, _, _]| i as f32);
        let out = ShrinkImageFilter::uniform(2).apply(&image);
        assert_eq!(out.shape(), [2, 2, 1]);
        assert_eq!(out.get([0, 0, 0]), Some(0.5));
        assert_eq!(out.get([1, 1, 0]), Some(2.5));
    }

    #[test]
    fn test_shrink_updates_spacing_and_origin() {
        let metadata = ImageMetadata::new(
            Point3::new([10.0, 0.0, 0.0]),
            Spacing3::new([1.0, 2.0, 1.0]),
            Direction3::identity(),
        );
        let image = VoxelGrid::from_elem([8, 8, 8], 1.0f32, metadata);
        let out = ShrinkImageFilter::new([2, 4, 1]).apply(&image);
        assert_eq!(out.shape(), [4, 2, 8]);
        assert_eq!(out.spacing(), &Spacing3::new([2.0, 8.0, 1.0]));
        assert_eq!(out.origin(), &Point3::new([10.5, 3.0, 0.0]));
    }

    #[test]
    fn test_shrink_never_produces_empty_axis() {
        let image = VoxelGrid::from_elem([3, 8, 8], 2.0f32, ImageMetadata::default());
        let out = ShrinkImageFilter::uniform(4).apply(&image);
        assert_eq!(out.shape(), [1, 2, 2]);
        assert_eq!(out.get([0, 0, 0]), Some(2.0));
    }
}
