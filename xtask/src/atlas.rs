use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use skullstrip_core::image::{ComponentType, PixelShape};
use skullstrip_io::{probe_image_info, ImageInfo};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// One file of the SwissSkullStripper sample atlas.
#[derive(Debug, Clone, Copy)]
pub struct AtlasFile {
    pub role: &'static str,
    pub url: &'static str,
    pub file_name: &'static str,
    pub component: ComponentType,
}

pub const ATLAS_IMAGE: AtlasFile = AtlasFile {
    role: "atlas image",
    url: "https://github.com/lorensen/SwissSkullStripperExtension/blob/master/SwissSkullStripper/Data/Input/atlasImage.mha?raw=true",
    file_name: "SwissSkullStripperAtlasImage.mha",
    component: ComponentType::Int16,
};

pub const ATLAS_MASK: AtlasFile = AtlasFile {
    role: "atlas mask",
    url: "https://github.com/lorensen/SwissSkullStripperExtension/blob/master/SwissSkullStripper/Data/Input/atlasMask.mha?raw=true",
    file_name: "SwissSkullStripperAtlasMask.mha",
    component: ComponentType::UInt8,
};

pub const ATLAS_FILES: [AtlasFile; 2] = [ATLAS_IMAGE, ATLAS_MASK];

/// Checked description of one downloaded atlas file.
#[derive(Debug, Clone)]
pub struct VerifiedFile {
    pub path: PathBuf,
    pub info: ImageInfo,
    pub sha256: String,
}

/// Downloads and checks the sample atlas in one directory.
pub struct AtlasManager {
    data_dir: PathBuf,
}

impl AtlasManager {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn path(&self, file: &AtlasFile) -> PathBuf {
        self.data_dir.join(file.file_name)
    }

    pub fn download(&self, force: bool) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create {}", self.data_dir.display()))?;

        for file in &ATLAS_FILES {
            let path = self.path(file);
            if path.exists() && !force {
                info!("{} already exists at {}. Use --force to re-download.", file.role, path.display());
                continue;
            }

            info!("Downloading {} from: {}", file.role, file.url);
            let data = download_with_progress(file.url)?;
            std::fs::write(&path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Saved {} ({} bytes, sha256 {})", path.display(), data.len(), sha256_hex(&data));
        }
        Ok(())
    }

    /// Probe both files and check their pixel types and extents agree.
    pub fn verify(&self) -> Result<Vec<VerifiedFile>> {
        let mut verified = Vec::with_capacity(ATLAS_FILES.len());
        for file in &ATLAS_FILES {
            verified.push(verify_file(file, &self.path(file))?);
        }
        if let [image, mask] = verified.as_slice() {
            if image.info.size != mask.info.size {
                bail!(
                    "Atlas image extent {:?} does not match atlas mask extent {:?}",
                    image.info.size,
                    mask.info.size
                );
            }
        }
        Ok(verified)
    }
}

fn verify_file(file: &AtlasFile, path: &Path) -> Result<VerifiedFile> {
    if !path.exists() {
        bail!(
            "Missing {} {}. Run 'cargo xtask download-atlas' first.",
            file.role,
            path.display()
        );
    }
    let info = probe_image_info(path)?;
    if info.component != file.component || info.pixel != PixelShape::Scalar {
        bail!(
            "{} {} is {} {}, expected scalar {}",
            file.role,
            path.display(),
            info.pixel,
            info.component,
            file.component
        );
    }
    if info.dimensions != 3 {
        bail!("{} {} has {} dimensions, expected 3", file.role, path.display(), info.dimensions);
    }
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(VerifiedFile {
        path: path.to_path_buf(),
        info,
        sha256: sha256_hex(&data),
    })
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Download data with progress bar
fn download_with_progress(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to download from {}", url))?;

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut data = Vec::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = response.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..bytes_read]);
        pb.inc(bytes_read as u64);
    }

    pb.finish_with_message("Download complete");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skullstrip_core::image::{ImageMetadata, VoxelGrid};

    fn write_atlas(dir: &Path, mask_size: [usize; 3]) -> AtlasManager {
        let manager = AtlasManager::new(dir);
        let image = VoxelGrid::from_elem([4, 5, 6], 300i16, ImageMetadata::default());
        let mask = VoxelGrid::from_elem(mask_size, 1u8, ImageMetadata::default());
        skullstrip_io::write_image(manager.path(&ATLAS_IMAGE), &image).unwrap();
        skullstrip_io::write_image(manager.path(&ATLAS_MASK), &mask).unwrap();
        manager
    }

    #[test]
    fn test_verify_accepts_matching_atlas() {
        let dir = tempfile::tempdir().unwrap();
        let manager = write_atlas(dir.path(), [4, 5, 6]);
        let verified = manager.verify().unwrap();
        assert_eq!(verified.len(), 2);
        assert_eq!(verified[0].info.component, ComponentType::Int16);
        assert_eq!(verified[1].info.component, ComponentType::UInt8);
        assert_eq!(verified[0].sha256.len(), 64);
    }

    #[test]
    fn test_verify_rejects_mismatched_extent_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = write_atlas(dir.path(), [4, 5, 7]);
        assert!(manager.verify().unwrap_err().to_string().contains("extent"));

        let empty = tempfile::tempdir().unwrap();
        let err = AtlasManager::new(empty.path()).verify().unwrap_err();
        assert!(err.to_string().contains("download-atlas"));
    }

    #[test]
    fn test_verify_rejects_wrong_component_type() {
        let dir = tempfile::tempdir().unwrap();
        let manager = write_atlas(dir.path(), [4, 5, 6]);
        let float_image = VoxelGrid::from_elem([4, 5, 6], 1.0f32, ImageMetadata::default());
        skullstrip_io::write_image(manager.path(&ATLAS_IMAGE), &float_image).unwrap();
        let err = manager.verify().unwrap_err().to_string();
        assert!(err.contains("expected scalar short"), "{}", err);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
