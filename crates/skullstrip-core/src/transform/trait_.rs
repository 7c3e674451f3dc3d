//! Transform trait for spatial coordinate transformations.

use crate::spatial::Point;

/// Maps points from one physical space to another.
///
/// Registration transforms map fixed-image points into moving-image space,
/// which is also the direction resampling needs (output → input).
pub trait Transform<const D: usize>: Send + Sync {
    /// Apply the transform to a single point.
    fn transform_point(&self, point: &Point<D>) -> Point<D>;
}
