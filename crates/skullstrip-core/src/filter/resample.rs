//! Resample image filter.
//!
//! This module provides ResampleImageFilter which resamples an image
//! onto a new voxel grid using a transform and an interpolator.

use ndarray::{Array3, Zip};

use crate::image::{ImageGeometry, VoxelGrid};
use crate::interpolation::Interpolator;
use crate::spatial::{Point, Vector};
use crate::transform::Transform;

/// Resample image filter.
///
/// For every voxel of the output grid the filter computes its physical
/// point, maps it through `transform` into the input's physical space and
/// interpolates the input there. Points that land outside the input take
/// the default pixel value.
///
/// The transform maps Output Physical Space -> Input Physical Space.
pub struct ResampleImageFilter<'a, T, I>
where
    T: Transform<3>,
    I: Interpolator,
{
    geometry: ImageGeometry,
    transform: &'a T,
    interpolator: I,
    default_pixel_value: f32,
}

impl<'a, T, I> ResampleImageFilter<'a, T, I>
where
    T: Transform<3>,
    I: Interpolator,
{
    /// Create a new resample filter producing a grid with `geometry`.
    pub fn new(geometry: ImageGeometry, transform: &'a T, interpolator: I) -> Self {
        Self {
            geometry,
            transform,
            interpolator,
            default_pixel_value: 0.0,
        }
    }

    /// Set default pixel value for outside the field of view.
    pub fn with_default_pixel_value(mut self, value: f32) -> Self {
        self.default_pixel_value = value;
        self
    }

    /// Apply the filter to an input image.
    ///
    /// Returns `None` when the input direction matrix is singular.
    pub fn apply(&self, input: &VoxelGrid<f32>) -> Option<VoxelGrid<f32>> {
        let to_input_index = input.metadata().physical_to_index_matrix()?;
        let input_origin = *input.origin();
        let to_output_physical = self.geometry.metadata.index_to_physical_matrix();
        let output_origin = *self.geometry.metadata.origin();

        let size = self.geometry.size;
        let mut data = Array3::<f32>::zeros((size[0], size[1], size[2]));
        let source = input.data();

        Zip::indexed(&mut data).par_for_each(|(i, j, k), value| {
            let index = nalgebra::Vector3::new(i as f64, j as f64, k as f64);
            let output_point = output_origin + Vector(to_output_physical * index);
            let input_point: Point<3> = self.transform.transform_point(&output_point);
            let continuous = to_input_index * (input_point - input_origin).0;
            *value = self
                .interpolator
                .evaluate(source, [continuous[0], continuous[1], continuous[2]])
                .unwrap_or(self.default_pixel_value);
        });

        Some(VoxelGrid::new(data, self.geometry.metadata.clone()))
    }
}
