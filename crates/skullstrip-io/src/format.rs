use anyhow::{bail, Result};
use skullstrip_core::image::{ComponentType, PixelShape};
use std::path::Path;

/// On-disk volume format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    /// `.nii` or `.nii.gz`
    Nifti,
    /// `.mha` or `.mhd`
    MetaImage,
}

impl VolumeFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Ok(Self::Nifti)
        } else if name.ends_with(".mha") || name.ends_with(".mhd") {
            Ok(Self::MetaImage)
        } else {
            bail!("Unsupported image file extension: {}", path.display())
        }
    }
}

/// Header-level description of a stored volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub component: ComponentType,
    pub pixel: PixelShape,
    pub dimensions: usize,
    pub size: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(VolumeFormat::from_path(Path::new("a/b.nii")).unwrap(), VolumeFormat::Nifti);
        assert_eq!(VolumeFormat::from_path(Path::new("b.NII.GZ")).unwrap(), VolumeFormat::Nifti);
        assert_eq!(VolumeFormat::from_path(Path::new("atlas.mha")).unwrap(), VolumeFormat::MetaImage);
        assert_eq!(VolumeFormat::from_path(Path::new("atlas.mhd")).unwrap(), VolumeFormat::MetaImage);

        let err = VolumeFormat::from_path(Path::new("scan.dcm")).unwrap_err();
        assert!(err.to_string().contains("scan.dcm"));
        assert!(VolumeFormat::from_path(Path::new("archive.gz")).is_err());
    }
}
