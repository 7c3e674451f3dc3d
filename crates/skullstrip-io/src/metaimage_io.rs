//! MetaImage (`.mha` / `.mhd`) reader and writer.
//!
//! Supports binary payloads stored inline (`ElementDataFile = LOCAL`) or in
//! a single detached file, optionally zlib-compressed.

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use nalgebra::SMatrix;
use ndarray::{Array3, ShapeBuilder};
use skullstrip_core::image::{ComponentType, ImageMetadata, PixelShape, Voxel, VoxelGrid};
use skullstrip_core::spatial::{Direction, Point, Spacing};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::format::ImageInfo;

/// Headers longer than this are not MetaImage text.
const MAX_HEADER_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
enum DataFile {
    Local,
    Detached(PathBuf),
}

/// Parsed MetaImage header.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaHeader {
    pub size: Vec<usize>,
    pub spacing: Vec<f64>,
    pub origin: Vec<f64>,
    /// `ndims × ndims` values; each consecutive group is one axis direction.
    pub transform: Vec<f64>,
    pub component: ComponentType,
    pub channels: usize,
    pub big_endian: bool,
    pub compressed: bool,
    header_size: Option<i64>,
    data_file: DataFile,
}

fn met_component(name: &str) -> Result<ComponentType> {
    let base = name.strip_suffix("_ARRAY").unwrap_or(name);
    Ok(match base {
        "MET_UCHAR" => ComponentType::UInt8,
        "MET_CHAR" => ComponentType::Int8,
        "MET_USHORT" => ComponentType::UInt16,
        "MET_SHORT" => ComponentType::Int16,
        "MET_UINT" | "MET_ULONG" => ComponentType::UInt32,
        "MET_INT" | "MET_LONG" => ComponentType::Int32,
        "MET_ULONG_LONG" => ComponentType::UInt64,
        "MET_LONG_LONG" => ComponentType::Int64,
        "MET_FLOAT" => ComponentType::Float32,
        "MET_DOUBLE" => ComponentType::Float64,
        other => bail!("Unsupported MetaImage ElementType {}", other),
    })
}

fn met_name(component: ComponentType) -> &'static str {
    match component {
        ComponentType::UInt8 => "MET_UCHAR",
        ComponentType::Int8 => "MET_CHAR",
        ComponentType::UInt16 => "MET_USHORT",
        ComponentType::Int16 => "MET_SHORT",
        ComponentType::UInt32 => "MET_UINT",
        ComponentType::Int32 => "MET_INT",
        ComponentType::UInt64 => "MET_ULONG_LONG",
        ComponentType::Int64 => "MET_LONG_LONG",
        ComponentType::Float32 => "MET_FLOAT",
        ComponentType::Float64 => "MET_DOUBLE",
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => bail!("Invalid boolean for {}: {}", key, value),
    }
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split_whitespace()
        .map(|v| v.parse::<T>().map_err(|_| anyhow!("Invalid value for {}: {}", key, value)))
        .collect()
}

impl MetaHeader {
    fn from_fields(fields: &[(String, String)], header_dir: &Path) -> Result<Self> {
        let get = |names: &[&str]| {
            fields
                .iter()
                .find(|(k, _)| names.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v.as_str()))
        };

        let (key, value) = get(&["NDims"]).context("MetaImage header is missing NDims")?;
        let ndims: usize = value
            .parse()
            .map_err(|_| anyhow!("Invalid value for {}: {}", key, value))?;
        if ndims == 0 {
            bail!("MetaImage NDims must be positive");
        }

        let (key, value) = get(&["DimSize"]).context("MetaImage header is missing DimSize")?;
        let size: Vec<usize> = parse_list(key, value)?;
        if size.len() != ndims {
            bail!("DimSize has {} entries, expected {}", size.len(), ndims);
        }

        let spacing = match get(&["ElementSpacing", "ElementSize"]) {
            Some((key, value)) => parse_list(key, value)?,
            None => vec![1.0; ndims],
        };
        let origin = match get(&["Offset", "Origin", "Position"]) {
            Some((key, value)) => parse_list(key, value)?,
            None => vec![0.0; ndims],
        };
        let transform = match get(&["TransformMatrix", "Rotation", "Orientation"]) {
            Some((key, value)) => parse_list(key, value)?,
            None => {
                let mut identity = vec![0.0; ndims * ndims];
                for i in 0..ndims {
                    identity[i * ndims + i] = 1.0;
                }
                identity
            }
        };
        if spacing.len() != ndims || origin.len() != ndims || transform.len() != ndims * ndims {
            bail!("MetaImage geometry fields do not match NDims = {}", ndims);
        }

        let (_, value) = get(&["ElementType"]).context("MetaImage header is missing ElementType")?;
        let component = met_component(value)?;

        let channels: usize = match get(&["ElementNumberOfChannels"]) {
            Some((key, value)) => value
                .parse()
                .map_err(|_| anyhow!("Invalid value for {}: {}", key, value))?,
            None => 1,
        };

        let big_endian = match get(&["BinaryDataByteOrderMSB", "ElementByteOrderMSB"]) {
            Some((key, value)) => parse_bool(key, value)?,
            None => false,
        };
        let compressed = match get(&["CompressedData"]) {
            Some((key, value)) => parse_bool(key, value)?,
            None => false,
        };
        if let Some((key, value)) = get(&["BinaryData"]) {
            if !parse_bool(key, value)? {
                bail!("ASCII MetaImage payloads are not supported");
            }
        }
        let header_size: Option<i64> = match get(&["HeaderSize"]) {
            Some((key, value)) => Some(
                value
                    .parse()
                    .map_err(|_| anyhow!("Invalid value for {}: {}", key, value))?,
            ),
            None => None,
        };

        let (_, value) = get(&["ElementDataFile"]).context("MetaImage header is missing ElementDataFile")?;
        let data_file = if value.eq_ignore_ascii_case("LOCAL") {
            DataFile::Local
        } else if value.starts_with("LIST") || value.contains('%') {
            bail!("Multi-file MetaImage payloads are not supported");
        } else {
            DataFile::Detached(header_dir.join(value))
        };

        Ok(Self {
            size,
            spacing,
            origin,
            transform,
            component,
            channels,
            big_endian,
            compressed,
            header_size,
            data_file,
        })
    }

    pub fn ndims(&self) -> usize {
        self.size.len()
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            component: self.component,
            pixel: PixelShape::from_channels(self.channels),
            dimensions: self.ndims(),
            size: self.size.clone(),
        }
    }

    fn voxel_count(&self) -> Result<usize> {
        self.size
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| anyhow!("MetaImage extent {:?} is too large", self.size))
    }

    /// Size in bytes of the decoded payload.
    fn payload_bytes(&self) -> Result<usize> {
        self.voxel_count()?
            .checked_mul(self.component.size_of())
            .ok_or_else(|| anyhow!("MetaImage extent {:?} is too large", self.size))
    }

    /// Extent padded or trimmed to three axes.
    fn size3(&self) -> Result<[usize; 3]> {
        if self.size.iter().skip(3).any(|&d| d != 1) {
            bail!("Expected a 3D volume, found extent {:?}", self.size);
        }
        Ok(std::array::from_fn(|d| self.size.get(d).copied().unwrap_or(1)))
    }

    /// Geometry of the first three axes; missing axes are unit and orthogonal.
    fn metadata(&self) -> ImageMetadata<3> {
        let n = self.ndims();
        let origin = Point::new(std::array::from_fn(|d| self.origin.get(d).copied().unwrap_or(0.0)));
        let spacing = Spacing::new(std::array::from_fn(|d| self.spacing.get(d).copied().unwrap_or(1.0)));
        let mut matrix = SMatrix::<f64, 3, 3>::identity();
        for axis in 0..n.min(3) {
            for row in 0..n.min(3) {
                matrix[(row, axis)] = self.transform[axis * n + row];
            }
        }
        ImageMetadata::new(origin, spacing, Direction(matrix))
    }
}

/// Read header fields up to and including `ElementDataFile`.
///
/// Returns the header and the number of bytes it occupies.
fn read_header<R: BufRead>(reader: &mut R, header_dir: &Path) -> Result<(MetaHeader, u64)> {
    let mut fields = Vec::new();
    let mut consumed = 0u64;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).context("Failed to read MetaImage header")?;
        if n == 0 {
            bail!("MetaImage header ended before ElementDataFile");
        }
        consumed += n as u64;
        if consumed > MAX_HEADER_BYTES {
            bail!("MetaImage header exceeds {} bytes", MAX_HEADER_BYTES);
        }
        let text = std::str::from_utf8(&line).context("MetaImage header is not valid text")?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let (key, value) = text
            .split_once('=')
            .ok_or_else(|| anyhow!("Malformed MetaImage header line: {}", text))?;
        let key = key.trim().to_string();
        let done = key == "ElementDataFile";
        fields.push((key, value.trim().to_string()));
        if done {
            break;
        }
    }
    Ok((MetaHeader::from_fields(&fields, header_dir)?, consumed))
}

fn header_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

/// Read only the header of a MetaImage file.
pub fn read_metaimage_header<P: AsRef<Path>>(path: P) -> Result<MetaHeader> {
    let path = path.as_ref();
    let file = File::open(path).context("Failed to open MetaImage file")?;
    let mut reader = BufReader::new(file);
    let (header, _) = read_header(&mut reader, header_dir(path))?;
    Ok(header)
}

pub fn probe_metaimage<P: AsRef<Path>>(path: P) -> Result<ImageInfo> {
    Ok(read_metaimage_header(path)?.info())
}

/// Raw (possibly compressed) payload bytes following the header.
fn read_payload(path: &Path, header: &MetaHeader, header_len: u64, expected: usize) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    match &header.data_file {
        DataFile::Local => {
            let mut file = File::open(path).context("Failed to open MetaImage file")?;
            file.seek(SeekFrom::Start(header_len))?;
            file.read_to_end(&mut raw).context("Failed to read MetaImage payload")?;
        }
        DataFile::Detached(data_path) => {
            let mut file = File::open(data_path)
                .with_context(|| format!("Failed to open MetaImage data file {}", data_path.display()))?;
            file.read_to_end(&mut raw).context("Failed to read MetaImage payload")?;
            match header.header_size {
                Some(skip) if skip > 0 => {
                    let skip = skip as usize;
                    if skip > raw.len() {
                        bail!("MetaImage HeaderSize {} exceeds data file length {}", skip, raw.len());
                    }
                    raw.drain(..skip);
                }
                // -1: the payload is the tail of the file.
                Some(-1) if !header.compressed && raw.len() > expected => {
                    raw.drain(..raw.len() - expected);
                }
                _ => {}
            }
        }
    }

    if header.compressed {
        // Allocation follows the stream, never the header extent.
        let mut decoded = Vec::new();
        ZlibDecoder::new(raw.as_slice())
            .take(expected as u64)
            .read_to_end(&mut decoded)
            .context("Failed to decompress MetaImage payload")?;
        raw = decoded;
    }
    Ok(raw)
}

/// Decode `count` stored samples and convert them to `T`.
fn decode_samples<T: Voxel>(component: ComponentType, bytes: &[u8], big_endian: bool, count: usize) -> Vec<T> {
    macro_rules! cast_from {
        ($s:ty) => {
            bytes
                .chunks_exact(std::mem::size_of::<$s>())
                .take(count)
                .map(|chunk| T::from_f64(<$s as Voxel>::decode(chunk, big_endian).to_f64()))
                .collect()
        };
    }
    match component {
        ComponentType::UInt8 => cast_from!(u8),
        ComponentType::Int8 => cast_from!(i8),
        ComponentType::UInt16 => cast_from!(u16),
        ComponentType::Int16 => cast_from!(i16),
        ComponentType::UInt32 => cast_from!(u32),
        ComponentType::Int32 => cast_from!(i32),
        ComponentType::UInt64 => cast_from!(u64),
        ComponentType::Int64 => cast_from!(i64),
        ComponentType::Float32 => cast_from!(f32),
        ComponentType::Float64 => cast_from!(f64),
    }
}

/// Read a scalar MetaImage volume, converting samples to `T`.
pub fn read_metaimage<T: Voxel, P: AsRef<Path>>(path: P) -> Result<VoxelGrid<T>> {
    let path = path.as_ref();
    let file = File::open(path).context("Failed to open MetaImage file")?;
    let mut reader = BufReader::new(file);
    let (header, header_len) = read_header(&mut reader, header_dir(path))?;
    drop(reader);

    if header.channels != 1 {
        bail!("Expected a scalar volume, found {} channels", header.channels);
    }
    let size = header.size3()?;
    let count = header.voxel_count()?;
    let expected = header.payload_bytes()?;

    let payload = read_payload(path, &header, header_len, expected)?;
    if payload.len() < expected {
        bail!(
            "MetaImage payload is truncated: expected {} bytes, found {}",
            expected,
            payload.len()
        );
    }

    let values = decode_samples::<T>(header.component, &payload, header.big_endian, count);
    // Stored with the first axis varying fastest.
    let data = Array3::from_shape_vec((size[0], size[1], size[2]).f(), values)
        .context("Failed to shape MetaImage payload")?;

    Ok(VoxelGrid::new(data, header.metadata()))
}

fn format_list<I: IntoIterator<Item = f64>>(values: I) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write an image as MetaImage.
///
/// `.mha` keeps the payload inline; `.mhd` writes it next to the header as
/// `<stem>.raw` (or `<stem>.zraw` when compressed).
pub fn write_metaimage<T: Voxel, P: AsRef<Path>>(path: P, image: &VoxelGrid<T>, compress: bool) -> Result<()> {
    let path = path.as_ref();
    let detached = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("mhd"))
        .unwrap_or(false);

    let mut payload = Vec::with_capacity(image.len() * T::COMPONENT.size_of());
    // Reversed-axis view iterates with x fastest.
    for &value in image.data().t().iter() {
        value.encode(false, &mut payload);
    }
    if compress {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload)?;
        payload = encoder.finish().context("Failed to compress MetaImage payload")?;
    }

    let direction = image.direction();
    let shape = image.shape();
    let mut header = String::new();
    header.push_str("ObjectType = Image\n");
    header.push_str("NDims = 3\n");
    header.push_str("BinaryData = True\n");
    header.push_str("BinaryDataByteOrderMSB = False\n");
    header.push_str(if compress { "CompressedData = True\n" } else { "CompressedData = False\n" });
    if compress {
        header.push_str(&format!("CompressedDataSize = {}\n", payload.len()));
    }
    header.push_str(&format!(
        "TransformMatrix = {}\n",
        format_list((0..3).flat_map(|axis| (0..3).map(move |row| direction[(row, axis)])))
    ));
    header.push_str(&format!("Offset = {}\n", format_list(image.origin().to_array())));
    header.push_str("CenterOfRotation = 0 0 0\n");
    header.push_str(&format!("ElementSpacing = {}\n", format_list(image.spacing().to_array())));
    header.push_str(&format!("DimSize = {} {} {}\n", shape[0], shape[1], shape[2]));
    header.push_str(&format!("ElementType = {}\n", met_name(T::COMPONENT)));

    if detached {
        let data_path = path.with_extension(if compress { "zraw" } else { "raw" });
        let data_name = data_path
            .file_name()
            .ok_or_else(|| anyhow!("Invalid MetaImage output path"))?
            .to_string_lossy()
            .into_owned();
        header.push_str(&format!("ElementDataFile = {}\n", data_name));
        std::fs::write(&data_path, &payload)
            .with_context(|| format!("Failed to write MetaImage data file {}", data_path.display()))?;
        std::fs::write(path, header.as_bytes()).context("Failed to write MetaImage header")?;
    } else {
        header.push_str("ElementDataFile = LOCAL\n");
        let mut file = File::create(path).context("Failed to create MetaImage file")?;
        file.write_all(header.as_bytes())?;
        file.write_all(&payload)?;
        file.flush()?;
    }
    Ok(())
}
