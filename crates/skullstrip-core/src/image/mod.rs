//! Voxel grids and their physical metadata.
//!
//! This module provides the [`VoxelGrid`] type, the metadata that maps
//! indices to physical coordinates, and the closed set of voxel component
//! types a volume can be stored as.

pub mod component;
pub mod metadata;
pub mod voxel_grid;

pub use component::{ComponentType, PixelShape, Voxel};
pub use metadata::{ImageGeometry, ImageMetadata, GEOMETRY_TOLERANCE};
pub use voxel_grid::VoxelGrid;
