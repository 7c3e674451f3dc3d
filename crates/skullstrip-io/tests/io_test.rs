use skullstrip_core::image::{ComponentType, ImageMetadata, PixelShape, VoxelGrid};
use skullstrip_core::spatial::{Direction, Point, Spacing, Vector};
use skullstrip_io::{probe_image_info, read_image, write_image};
use tempfile::tempdir;

fn oblique_grid() -> VoxelGrid<i16> {
    let c = std::f64::consts::FRAC_1_SQRT_2;
    let metadata = ImageMetadata::new(
        Point::new([12.0, -40.0, 7.5]),
        Spacing::new([1.0, 1.25, 3.0]),
        Direction::from_axes([
            Vector::new([c, c, 0.0]),
            Vector::new([-c, c, 0.0]),
            Vector::new([0.0, 0.0, 1.0]),
        ]),
    );
    VoxelGrid::from_fn([6, 5, 4], metadata, |[i, j, k]| (i * 100 + j * 10 + k) as i16 - 250)
}

#[test]
fn test_same_volume_through_every_format() {
    let dir = tempdir().unwrap();
    let grid = oblique_grid();

    for name in ["out.nii", "out.nii.gz", "out.mha", "out.mhd"] {
        let path = dir.path().join(name);
        write_image(&path, &grid).unwrap();

        let info = probe_image_info(&path).unwrap();
        assert_eq!(info.component, ComponentType::Int16, "{name}");
        assert_eq!(info.pixel, PixelShape::Scalar, "{name}");
        assert_eq!(info.size, vec![6, 5, 4], "{name}");

        let back = read_image::<i16, _>(&path).unwrap();
        assert_eq!(back.data(), grid.data(), "{name}");
        // NIfTI stores geometry in single precision.
        let origin_error = (*back.origin() - *grid.origin()).norm();
        assert!(origin_error < 1e-4, "{name}: {origin_error}");
        let direction_error = back.direction().max_abs_diff(grid.direction());
        assert!(direction_error < 1e-5, "{name}: {direction_error}");
    }
}

#[test]
fn test_read_casts_to_requested_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("label.mha");
    let label = VoxelGrid::from_fn([3, 3, 3], ImageMetadata::default(), |[i, _, _]| if i == 1 { 255u8 } else { 0 });
    write_image(&path, &label).unwrap();

    assert_eq!(probe_image_info(&path).unwrap().component, ComponentType::UInt8);
    let as_float = read_image::<f32, _>(&path).unwrap();
    assert_eq!(as_float.get([1, 0, 0]), Some(255.0));
    assert_eq!(as_float.get([0, 0, 0]), Some(0.0));
}

#[test]
fn test_missing_and_unknown_files_name_the_path() {
    let dir = tempdir().unwrap();

    let missing = dir.path().join("missing.nii");
    let err = probe_image_info(&missing).unwrap_err();
    assert!(format!("{err:#}").contains("missing.nii"), "{err:#}");

    let unknown = dir.path().join("volume.png");
    std::fs::write(&unknown, b"not an image").unwrap();
    let err = read_image::<i16, _>(&unknown).unwrap_err();
    assert!(err.to_string().contains("volume.png"), "{err}");
}

#[test]
fn test_corrupt_header_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.nii");
    std::fs::write(&path, vec![0u8; 64]).unwrap();
    assert!(probe_image_info(&path).is_err());
    assert!(read_image::<i16, _>(&path).is_err());
}

fn write_raw_metaimage(path: &std::path::Path, dim_size: &str, compressed: bool, payload: &[u8]) {
    let mut bytes = format!(
        "ObjectType = Image\nNDims = 3\nDimSize = {dim_size}\nElementType = MET_SHORT\nCompressedData = {}\nElementDataFile = LOCAL\n",
        if compressed { "True" } else { "False" }
    )
    .into_bytes();
    bytes.extend_from_slice(payload);
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn test_oversized_compressed_extent_is_an_error() {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = tempdir().unwrap();
    let path = dir.path().join("huge.mha");
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&[0u8; 16]).unwrap();
    write_raw_metaimage(&path, "100000 100000 100000", true, &encoder.finish().unwrap());

    assert_eq!(probe_image_info(&path).unwrap().size, vec![100000, 100000, 100000]);
    let err = read_image::<i16, _>(&path).unwrap_err();
    assert!(format!("{err:#}").contains("truncated"), "{err:#}");
}

#[test]
fn test_overflowing_extent_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overflow.mha");
    write_raw_metaimage(&path, "4294967296 4294967296 16", false, &[0u8; 8]);

    let err = read_image::<i16, _>(&path).unwrap_err();
    assert!(format!("{err:#}").contains("too large"), "{err:#}");

    let doubled = dir.path().join("overflow_bytes.mha");
    // Voxel count fits, the byte count does not.
    write_raw_metaimage(&doubled, "4294967296 1073741824 2", false, &[0u8; 8]);
    let err = read_image::<i16, _>(&doubled).unwrap_err();
    assert!(format!("{err:#}").contains("too large"), "{err:#}");
}
