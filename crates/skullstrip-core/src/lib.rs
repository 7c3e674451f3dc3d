pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use image::{ComponentType, ImageGeometry, ImageMetadata, PixelShape, Voxel, VoxelGrid};
pub use spatial::{Direction, Point, Spacing, Vector};
