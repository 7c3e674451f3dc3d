use anyhow::{anyhow, bail, Context, Result};
use nalgebra::SMatrix;
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{InMemNiftiVolume, IntoNdArray, NiftiHeader, NiftiObject, NiftiType, ReaderOptions};
use skullstrip_core::image::{ComponentType, ImageMetadata, PixelShape, Voxel, VoxelGrid};
use skullstrip_core::spatial::{Direction, Point, Spacing, Vector};
use std::path::Path;

use crate::format::ImageInfo;

/// NIFTI_UNITS_MM | NIFTI_UNITS_SEC
const XYZT_UNITS_MM_SEC: u8 = 2 | 8;
/// NIFTI_XFORM_SCANNER_ANAT
const XFORM_SCANNER_ANAT: i16 = 1;

/// Voxel types the NIfTI reader and writer can produce and store directly.
pub trait NiftiElement: Voxel {
    /// Decode the volume, converting and rescaling stored samples to `Self`.
    fn volume_to_ndarray(volume: InMemNiftiVolume) -> Result<ArrayD<Self>>;

    /// Write `data` with geometry taken from `header`.
    fn write_ndarray(path: &Path, header: &NiftiHeader, data: &Array3<Self>) -> Result<()>;
}

macro_rules! impl_nifti_element {
    ($($t:ty),* $(,)?) => {
        $(
            impl NiftiElement for $t {
                fn volume_to_ndarray(volume: InMemNiftiVolume) -> Result<ArrayD<Self>> {
                    volume
                        .into_ndarray::<$t>()
                        .context("Failed to convert volume to ndarray")
                }

                fn write_ndarray(path: &Path, header: &NiftiHeader, data: &Array3<Self>) -> Result<()> {
                    WriterOptions::new(path)
                        .reference_header(header)
                        .write_nifti(data)
                        .map_err(|e| anyhow!("Failed to write NIfTI file: {}", e))
                }
            }
        )*
    };
}

impl_nifti_element!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Component type and pixel shape of a stored NIfTI datatype.
fn classify(datatype: NiftiType) -> Result<(ComponentType, PixelShape)> {
    Ok(match datatype {
        NiftiType::Uint8 => (ComponentType::UInt8, PixelShape::Scalar),
        NiftiType::Int8 => (ComponentType::Int8, PixelShape::Scalar),
        NiftiType::Uint16 => (ComponentType::UInt16, PixelShape::Scalar),
        NiftiType::Int16 => (ComponentType::Int16, PixelShape::Scalar),
        NiftiType::Uint32 => (ComponentType::UInt32, PixelShape::Scalar),
        NiftiType::Int32 => (ComponentType::Int32, PixelShape::Scalar),
        NiftiType::Uint64 => (ComponentType::UInt64, PixelShape::Scalar),
        NiftiType::Int64 => (ComponentType::Int64, PixelShape::Scalar),
        NiftiType::Float32 => (ComponentType::Float32, PixelShape::Scalar),
        NiftiType::Float64 => (ComponentType::Float64, PixelShape::Scalar),
        NiftiType::Rgb24 => (ComponentType::UInt8, PixelShape::Vector(3)),
        NiftiType::Rgba32 => (ComponentType::UInt8, PixelShape::Vector(4)),
        NiftiType::Complex64 => (ComponentType::Float32, PixelShape::Vector(2)),
        NiftiType::Complex128 => (ComponentType::Float64, PixelShape::Vector(2)),
        other => bail!("Unsupported NIfTI datatype {:?}", other),
    })
}

/// Read the header of a NIfTI file without decoding voxel data.
pub fn probe_nifti<P: AsRef<Path>>(path: P) -> Result<ImageInfo> {
    let header = NiftiHeader::from_file(path.as_ref()).context("Failed to read NIfTI header")?;
    let datatype = header
        .data_type()
        .map_err(|e| anyhow!("Invalid NIfTI datatype: {}", e))?;
    let (component, mut pixel) = classify(datatype)?;

    let ndim = header.dim[0] as usize;
    if ndim == 0 || ndim > 7 {
        bail!("Invalid NIfTI dimension count {}", ndim);
    }
    // dim[5] holds vector components (NIFTI_INTENT_VECTOR and friends).
    if ndim >= 5 && header.dim[5] > 1 {
        if !pixel.is_scalar() {
            bail!("Vector datatype {:?} with a vector dimension is not supported", datatype);
        }
        pixel = PixelShape::Vector(header.dim[5] as usize);
    }
    let spatial = ndim.min(4);
    let size: Vec<usize> = header.dim[1..=spatial].iter().map(|&d| d as usize).collect();

    Ok(ImageInfo {
        component,
        pixel,
        dimensions: size.len(),
        size,
    })
}

/// Index → RAS affine rows of a header: sform, else qform, else pixdim.
fn header_affine(header: &NiftiHeader) -> [[f32; 4]; 4] {
    if header.sform_code > 0 {
        [header.srow_x, header.srow_y, header.srow_z, [0.0, 0.0, 0.0, 1.0]]
    } else if header.qform_code > 0 {
        let b = header.quatern_b;
        let c = header.quatern_c;
        let d = header.quatern_d;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 { 1.0 } else { header.pixdim[0] };

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;

        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;

        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3] * qfac;

        [
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else {
        // Fallback: use pixdim scaling only
        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3];
        [
            [dx, 0.0, 0.0, 0.0],
            [0.0, dy, 0.0, 0.0],
            [0.0, 0.0, dz, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Geometry in LPS from a NIfTI (RAS) header.
fn header_metadata(header: &NiftiHeader) -> ImageMetadata<3> {
    let affine = header_affine(header);
    // RAS -> LPS: flip the sign of the first two physical axes.
    let flip = [-1.0, -1.0, 1.0];
    let m = |row: usize, col: usize| affine[row][col] as f64 * flip[row];

    let origin = Point::new([m(0, 3), m(1, 3), m(2, 3)]);

    // Columns of the rotation matrix (scaled by spacing)
    let col0 = Vector::new([m(0, 0), m(1, 0), m(2, 0)]);
    let col1 = Vector::new([m(0, 1), m(1, 1), m(2, 1)]);
    let col2 = Vector::new([m(0, 2), m(1, 2), m(2, 2)]);

    let sp0 = col0.norm();
    let sp1 = col1.norm();
    let sp2 = col2.norm();

    // A zero column still needs a usable spacing and axis.
    let spacing = Spacing::new([
        if sp0 > 1e-9 { sp0 } else { 1.0 },
        if sp1 > 1e-9 { sp1 } else { 1.0 },
        if sp2 > 1e-9 { sp2 } else { 1.0 },
    ]);

    let d0 = if sp0 > 1e-9 { col0.0 / sp0 } else { nalgebra::Vector3::x_axis().into_inner() };
    let d1 = if sp1 > 1e-9 { col1.0 / sp1 } else { nalgebra::Vector3::y_axis().into_inner() };
    let d2 = if sp2 > 1e-9 { col2.0 / sp2 } else { nalgebra::Vector3::z_axis().into_inner() };

    let direction = Direction(SMatrix::<f64, 3, 3>::from_columns(&[d0, d1, d2]));

    ImageMetadata::new(origin, spacing, direction)
}

/// Drop trailing singleton axes, or pad missing ones, to get a 3-D array.
fn into_volume3<T>(data: ArrayD<T>) -> Result<Array3<T>> {
    let mut data = data;
    while data.ndim() > 3 {
        let last = data.ndim() - 1;
        if data.len_of(Axis(last)) != 1 {
            bail!("Expected a 3D volume, found extent {:?}", data.shape());
        }
        data = data.index_axis_move(Axis(last), 0);
    }
    while data.ndim() < 3 {
        let next = data.ndim();
        data = data.insert_axis(Axis(next));
    }
    data.into_dimensionality::<Ix3>()
        .context("Failed to reshape volume to 3D")
}

/// Read a scalar NIfTI volume, converting samples to `T`.
pub fn read_nifti<T: NiftiElement, P: AsRef<Path>>(path: P) -> Result<VoxelGrid<T>> {
    let path = path.as_ref();
    let info = probe_nifti(path)?;
    if !info.pixel.is_scalar() {
        bail!("Expected a scalar volume, found {} pixels", info.pixel);
    }

    let obj = ReaderOptions::new().read_file(path).context("Failed to read NIfTI file")?;
    let metadata = header_metadata(obj.header());
    let volume = T::volume_to_ndarray(obj.into_volume())?;
    let data = into_volume3(volume)?;

    Ok(VoxelGrid::new(data, metadata))
}

/// Header describing `grid`'s geometry in NIfTI (RAS) terms.
fn grid_header<T: Voxel>(grid: &VoxelGrid<T>) -> NiftiHeader {
    let index_to_lps = grid.metadata().index_to_physical_matrix();
    let origin = grid.origin();
    let flip = [-1.0, -1.0, 1.0];
    let row = |r: usize| -> [f32; 4] {
        [
            (index_to_lps[(r, 0)] * flip[r]) as f32,
            (index_to_lps[(r, 1)] * flip[r]) as f32,
            (index_to_lps[(r, 2)] * flip[r]) as f32,
            (origin[r] * flip[r]) as f32,
        ]
    };

    let spacing = grid.spacing();
    let mut pixdim = [1.0f32; 8];
    pixdim[1] = spacing[0] as f32;
    pixdim[2] = spacing[1] as f32;
    pixdim[3] = spacing[2] as f32;

    NiftiHeader {
        pixdim,
        scl_slope: 1.0,
        scl_inter: 0.0,
        xyzt_units: XYZT_UNITS_MM_SEC,
        qform_code: 0,
        sform_code: XFORM_SCANNER_ANAT,
        srow_x: row(0),
        srow_y: row(1),
        srow_z: row(2),
        ..NiftiHeader::default()
    }
}

/// Write an image to a NIfTI file.
///
/// # Arguments
/// * `path` - Path to write the NIfTI file; a `.gz` suffix compresses it
/// * `image` - The image to write
///
/// # Returns
/// Result indicating success or failure
pub fn write_nifti<T: NiftiElement, P: AsRef<Path>>(path: P, image: &VoxelGrid<T>) -> Result<()> {
    let header = grid_header(image);
    T::write_ndarray(path.as_ref(), &header, image.data())
}
