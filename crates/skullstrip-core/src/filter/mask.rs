//! Mask image filter.
//!
//! Keeps voxels where a mask is nonzero and replaces all others with the
//! outside value. Image and mask must share the same geometry.

use thiserror::Error;

use crate::image::{ImageGeometry, Voxel, VoxelGrid};

/// Image and mask do not sample the same voxels.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "mask geometry does not match image geometry (image extent {:?}, mask extent {:?})",
    .image.size,
    .mask.size
)]
pub struct GeometryMismatch {
    pub image: ImageGeometry,
    pub mask: ImageGeometry,
}

/// Mask image filter.
///
/// Output voxels equal the input where the mask is nonzero and
/// `outside_value` elsewhere. The output carries the input geometry.
#[derive(Debug, Clone, Copy)]
pub struct MaskImageFilter<T: Voxel> {
    outside_value: T,
}

impl<T: Voxel> MaskImageFilter<T> {
    pub fn new() -> Self {
        Self {
            outside_value: T::zero(),
        }
    }

    /// Set the value written where the mask is zero.
    pub fn with_outside_value(mut self, value: T) -> Self {
        self.outside_value = value;
        self
    }

    /// Apply the mask to `image`.
    pub fn apply(&self, image: &VoxelGrid<T>, mask: &VoxelGrid<u8>) -> Result<VoxelGrid<T>, GeometryMismatch> {
        if !image.same_geometry(mask) {
            return Err(GeometryMismatch {
                image: image.geometry(),
                mask: mask.geometry(),
            });
        }
        let outside = self.outside_value;
        let data = ndarray::Zip::from(image.data())
            .and(mask.data())
            .map_collect(|&value, &m| if m != 0 { value } else { outside });
        Ok(VoxelGrid::new(data, image.metadata().clone()))
    }
}

impl<T: Voxel> Default for MaskImageFilter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero every voxel of `image` outside `mask`.
pub fn apply_mask<T: Voxel>(image: &VoxelGrid<T>, mask: &VoxelGrid<u8>) -> Result<VoxelGrid<T>, GeometryMismatch> {
    MaskImageFilter::new().apply(image, mask)
}
