//! Volume storage seen by the pipeline.

use std::path::Path;

use anyhow::Result;
use skullstrip_core::image::VoxelGrid;
use skullstrip_io::{ImageInfo, VolumeElement};

/// Header probing, decoding and encoding of volumes.
pub trait VolumeCodec {
    /// Read the component type and pixel shape without decoding voxels.
    fn probe(&self, path: &Path) -> Result<ImageInfo>;

    /// Decode a volume as `T`.
    fn load<T: VolumeElement>(&self, path: &Path) -> Result<VoxelGrid<T>>;

    /// Encode `grid`, overwriting `path`.
    fn save<T: VolumeElement>(&self, grid: &VoxelGrid<T>, path: &Path) -> Result<()>;
}

/// Codec backed by the NIfTI and MetaImage files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

impl VolumeCodec for FileCodec {
    fn probe(&self, path: &Path) -> Result<ImageInfo> {
        skullstrip_io::probe_image_info(path)
    }

    fn load<T: VolumeElement>(&self, path: &Path) -> Result<VoxelGrid<T>> {
        skullstrip_io::read_image::<T, _>(path)
    }

    fn save<T: VolumeElement>(&self, grid: &VoxelGrid<T>, path: &Path) -> Result<()> {
        skullstrip_io::write_image(path, grid)
    }
}
