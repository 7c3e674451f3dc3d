//! Interpolator trait for sampling values at continuous indices.

use ndarray::Array3;

/// Samples a volume at non-integer voxel coordinates.
///
/// Indices are in `[x, y, z]` order, matching [`crate::image::VoxelGrid`].
pub trait Interpolator: Send + Sync {
    /// Value at `index`, or `None` when the index lies outside the buffer.
    fn evaluate(&self, data: &Array3<f32>, index: [f64; 3]) -> Option<f32>;
}
