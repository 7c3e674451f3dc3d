//! Image metadata and geometry.
//!
//! [`ImageMetadata`] describes how voxel indices map to physical
//! coordinates; [`ImageGeometry`] adds the extent so two grids can be
//! checked for voxel-by-voxel correspondence.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

use crate::spatial::{Direction, Point, Spacing, Vector};

/// Relative tolerance used when comparing geometries, scaled by the
/// smallest spacing for origins and spacings.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Physical space information of an image.
///
/// `point = origin + direction * (index ⊙ spacing)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata<const D: usize> {
    /// Physical coordinate of the first voxel (index 0, 0, ...).
    origin: Point<D>,
    /// Physical distance between voxels along each axis.
    spacing: Spacing<D>,
    /// Orientation of the image axes.
    direction: Direction<D>,
}

impl<const D: usize> ImageMetadata<D> {
    pub fn new(origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self {
            origin,
            spacing,
            direction,
        }
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Linear part of the index → physical mapping (`direction * diag(spacing)`).
    pub fn index_to_physical_matrix(&self) -> SMatrix<f64, D, D> {
        let mut m = self.direction.0;
        for col in 0..D {
            for row in 0..D {
                m[(row, col)] *= self.spacing[col];
            }
        }
        m
    }

    /// Linear part of the physical → index mapping, if the direction is invertible.
    pub fn physical_to_index_matrix(&self) -> Option<SMatrix<f64, D, D>> {
        self.index_to_physical_matrix().try_inverse()
    }

    /// Map a continuous index to a physical point.
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let offset = self.index_to_physical_matrix() * index.0.coords;
        self.origin + Vector(offset)
    }

    /// Map a physical point to a continuous index.
    ///
    /// Returns `None` when the direction matrix is singular.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Option<Point<D>> {
        let inverse = self.physical_to_index_matrix()?;
        let diff = *point - self.origin;
        Some(Point((inverse * diff.0).into()))
    }

    /// Whether two metadata describe the same physical sampling within
    /// [`GEOMETRY_TOLERANCE`].
    pub fn is_close(&self, other: &Self) -> bool {
        let coordinate_tolerance = GEOMETRY_TOLERANCE * self.spacing.min_spacing().abs();
        (self.origin - other.origin).0.amax() <= coordinate_tolerance
            && self.spacing.max_abs_diff(&other.spacing) <= coordinate_tolerance
            && self.direction.max_abs_diff(&other.direction) <= GEOMETRY_TOLERANCE
    }
}

impl<const D: usize> Default for ImageMetadata<D> {
    fn default() -> Self {
        Self {
            origin: Point::origin(),
            spacing: Spacing::uniform(1.0),
            direction: Direction::identity(),
        }
    }
}

/// Extent plus metadata of a 3-D voxel grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub size: [usize; 3],
    pub metadata: ImageMetadata<3>,
}

impl ImageGeometry {
    pub fn new(size: [usize; 3], metadata: ImageMetadata<3>) -> Self {
        Self { size, metadata }
    }

    pub fn len(&self) -> usize {
        self.size.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same extent and same physical sampling.
    pub fn matches(&self, other: &Self) -> bool {
        self.size == other.size && self.metadata.is_close(&other.metadata)
    }

    /// Physical position of the grid centre.
    pub fn physical_center(&self) -> Point<3> {
        let center = Point::new([
            (self.size[0] as f64 - 1.0) / 2.0,
            (self.size[1] as f64 - 1.0) / 2.0,
            (self.size[2] as f64 - 1.0) / 2.0,
        ]);
        self.metadata.transform_continuous_index_to_physical_point(&center)
    }
}
