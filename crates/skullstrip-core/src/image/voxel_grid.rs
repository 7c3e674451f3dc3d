//! Voxel grid with physical metadata.
//!
//! [`VoxelGrid`] pairs a dense 3-D array of samples with the metadata that
//! places each voxel in physical space. Index order is `[x, y, z]`: axis 0
//! is the fastest varying axis on disk.

use ndarray::Array3;

use super::component::Voxel;
use super::metadata::{ImageGeometry, ImageMetadata};
use crate::spatial::{Direction, Point, Spacing};

/// 3-D voxel grid of component type `T`.
///
/// # Examples
/// ```rust
/// use skullstrip_core::image::{ImageMetadata, VoxelGrid};
///
/// let grid = VoxelGrid::from_elem([4, 4, 4], 7i16, ImageMetadata::default());
/// assert_eq!(grid.shape(), [4, 4, 4]);
/// assert_eq!(grid.get([1, 2, 3]), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid<T> {
    data: Array3<T>,
    metadata: ImageMetadata<3>,
}

impl<T: Voxel> VoxelGrid<T> {
    /// Create a grid from voxel data and metadata.
    pub fn new(data: Array3<T>, metadata: ImageMetadata<3>) -> Self {
        Self { data, metadata }
    }

    /// Create a grid filled with `value`.
    pub fn from_elem(size: [usize; 3], value: T, metadata: ImageMetadata<3>) -> Self {
        Self::new(Array3::from_elem((size[0], size[1], size[2]), value), metadata)
    }

    /// Create a grid with every voxel computed from its index.
    pub fn from_fn<F>(size: [usize; 3], metadata: ImageMetadata<3>, mut f: F) -> Self
    where
        F: FnMut([usize; 3]) -> T,
    {
        let data = Array3::from_shape_fn((size[0], size[1], size[2]), |(i, j, k)| f([i, j, k]));
        Self::new(data, metadata)
    }

    /// Create a zero-valued grid with the given geometry.
    pub fn zeros(geometry: &ImageGeometry) -> Self {
        Self::from_elem(geometry.size, T::zero(), geometry.metadata.clone())
    }

    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    pub fn metadata(&self) -> &ImageMetadata<3> {
        &self.metadata
    }

    pub fn origin(&self) -> &Point<3> {
        self.metadata.origin()
    }

    pub fn spacing(&self) -> &Spacing<3> {
        self.metadata.spacing()
    }

    pub fn direction(&self) -> &Direction<3> {
        self.metadata.direction()
    }

    /// Extent along each axis.
    pub fn shape(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.data.dim();
        [nx, ny, nz]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extent plus metadata.
    pub fn geometry(&self) -> ImageGeometry {
        ImageGeometry::new(self.shape(), self.metadata.clone())
    }

    /// Whether `other` samples exactly the same voxels in physical space.
    pub fn same_geometry<U: Voxel>(&self, other: &VoxelGrid<U>) -> bool {
        self.shape() == other.shape() && self.metadata.is_close(other.metadata())
    }

    /// Value at an integer index, `None` outside the grid.
    pub fn get(&self, index: [usize; 3]) -> Option<T> {
        self.data.get((index[0], index[1], index[2])).copied()
    }

    /// Apply `f` to every voxel, keeping the geometry.
    pub fn map<U, F>(&self, f: F) -> VoxelGrid<U>
    where
        U: Voxel,
        F: Fn(T) -> U,
    {
        VoxelGrid::new(self.data.mapv(f), self.metadata.clone())
    }

    /// Lossy conversion to single precision.
    pub fn to_f32(&self) -> VoxelGrid<f32> {
        self.map(|v| v.to_f64() as f32)
    }

    /// Number of voxels that are not the zero value.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| !v.is_zero()).count()
    }

    /// Physical position of a (possibly fractional) index.
    pub fn index_to_physical_point(&self, index: &Point<3>) -> Point<3> {
        self.metadata.transform_continuous_index_to_physical_point(index)
    }

    /// Continuous index of a physical point; `None` for a singular direction.
    pub fn physical_point_to_continuous_index(&self, point: &Point<3>) -> Option<Point<3>> {
        self.metadata.transform_physical_point_to_continuous_index(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Point3, Spacing3};

    #[test]
    fn test_grid_creation() {
        let metadata = ImageMetadata::new(
            Point3::new([1.0, 2.0, 3.0]),
            Spacing3::new([0.5, 0.5, 2.0]),
            Direction::identity(),
        );
        let grid = VoxelGrid::from_elem([3, 4, 5], 0u8, metadata.clone());
        assert_eq!(grid.shape(), [3, 4, 5]);
        assert_eq!(grid.len(), 60);
        assert_eq!(grid.metadata(), &metadata);
        assert_eq!(grid.count_nonzero(), 0);
    }

    #[test]
    fn test_from_fn_uses_xyz_order() {
        let grid = VoxelGrid::from_fn([2, 3, 4], ImageMetadata::default(), |[i, j, k]| {
            (i + 10 * j + 100 * k) as i16
        });
        assert_eq!(grid.get([1, 2, 3]), Some(321));
        assert_eq!(grid.get([2, 0, 0]), None);
    }

    #[test]
    fn test_map_keeps_geometry() {
        let grid = VoxelGrid::from_elem([2, 2, 2], -3i16, ImageMetadata::default());
        let mapped = grid.map(|v| (v * 2) as f32);
        assert!(mapped.same_geometry(&grid));
        assert_eq!(mapped.get([0, 0, 0]), Some(-6.0));
    }

    #[test]
    fn test_same_geometry_detects_extent_and_spacing() {
        let a = VoxelGrid::from_elem([2, 2, 2], 0i16, ImageMetadata::default());
        let b = VoxelGrid::from_elem([2, 2, 3], 0u8, ImageMetadata::default());
        assert!(!a.same_geometry(&b));

        let c = VoxelGrid::from_elem(
            [2, 2, 2],
            0u8,
            ImageMetadata::new(Point3::origin(), Spacing3::uniform(2.0), Direction::identity()),
        );
        assert!(!a.same_geometry(&c));
    }

    #[test]
    fn test_non_zero_origin_mapping() {
        let grid = VoxelGrid::from_elem(
            [10, 10, 10],
            0f32,
            ImageMetadata::new(
                Point3::new([10.0, 20.0, 30.0]),
                Spacing3::uniform(1.0),
                Direction::identity(),
            ),
        );
        let index = grid
            .physical_point_to_continuous_index(&Point3::new([15.0, 25.0, 35.0]))
            .expect("invertible");
        assert!((index[0] - 5.0).abs() < 1e-9);
        assert!((index[1] - 5.0).abs() < 1e-9);
        assert!((index[2] - 5.0).abs() < 1e-9);
    }
}
