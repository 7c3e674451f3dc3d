pub mod format;
pub mod metaimage_io;
pub mod nifti_io;

use anyhow::{Context, Result};
use skullstrip_core::image::VoxelGrid;
use std::path::Path;

pub use format::{ImageInfo, VolumeFormat};
pub use metaimage_io::{probe_metaimage, read_metaimage, write_metaimage};
pub use nifti_io::{probe_nifti, read_nifti, write_nifti, NiftiElement};

/// Voxel types every supported format can read and write.
pub trait VolumeElement: NiftiElement {}

impl<T: NiftiElement> VolumeElement for T {}

/// Inspect a volume header without decoding voxel data.
pub fn probe_image_info<P: AsRef<Path>>(path: P) -> Result<ImageInfo> {
    let path = path.as_ref();
    let result = match VolumeFormat::from_path(path)? {
        VolumeFormat::Nifti => probe_nifti(path),
        VolumeFormat::MetaImage => probe_metaimage(path),
    };
    result.with_context(|| format!("Failed to read image header {}", path.display()))
}

/// Read a scalar 3-D volume, converting stored samples to `T`.
pub fn read_image<T: VolumeElement, P: AsRef<Path>>(path: P) -> Result<VoxelGrid<T>> {
    let path = path.as_ref();
    let result = match VolumeFormat::from_path(path)? {
        VolumeFormat::Nifti => read_nifti::<T, _>(path),
        VolumeFormat::MetaImage => read_metaimage::<T, _>(path),
    };
    result.with_context(|| format!("Failed to read image {}", path.display()))
}

/// Write a volume, replacing any existing file.
pub fn write_image<T: VolumeElement, P: AsRef<Path>>(path: P, image: &VoxelGrid<T>) -> Result<()> {
    let path = path.as_ref();
    let result = match VolumeFormat::from_path(path)? {
        VolumeFormat::Nifti => write_nifti(path, image),
        VolumeFormat::MetaImage => write_metaimage(path, image, false),
    };
    result.with_context(|| format!("Failed to write image {}", path.display()))
}
