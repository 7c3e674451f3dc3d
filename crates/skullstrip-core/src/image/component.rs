//! Voxel component types.
//!
//! [`ComponentType`] is the closed set of scalar storage formats a volume
//! header can declare. [`Voxel`] binds each primitive Rust type to its tag
//! and provides the conversions the codecs and filters need.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar storage format of one voxel component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

impl ComponentType {
    /// Every recognized component type.
    pub const ALL: [ComponentType; 10] = [
        ComponentType::UInt8,
        ComponentType::Int8,
        ComponentType::UInt16,
        ComponentType::Int16,
        ComponentType::UInt32,
        ComponentType::Int32,
        ComponentType::UInt64,
        ComponentType::Int64,
        ComponentType::Float32,
        ComponentType::Float64,
    ];

    /// Size of one component in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// The name ITK uses for this component type (`short`, `unsigned_char`, ...).
    pub fn itk_name(self) -> &'static str {
        match self {
            Self::UInt8 => "unsigned_char",
            Self::Int8 => "char",
            Self::UInt16 => "unsigned_short",
            Self::Int16 => "short",
            Self::UInt32 => "unsigned_int",
            Self::Int32 => "int",
            Self::UInt64 => "unsigned_long",
            Self::Int64 => "long",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.itk_name())
    }
}

/// Number of components stored per voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelShape {
    Scalar,
    /// Multi-component pixel (RGB, complex, vector fields).
    Vector(usize),
}

impl PixelShape {
    /// Shape for a given channel count; one channel is a scalar.
    pub fn from_channels(channels: usize) -> Self {
        if channels <= 1 {
            Self::Scalar
        } else {
            Self::Vector(channels)
        }
    }

    pub fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector(n) => n,
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Scalar)
    }
}

impl fmt::Display for PixelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => f.write_str("scalar"),
            Self::Vector(n) => write!(f, "vector[{}]", n),
        }
    }
}

/// A primitive type usable as a voxel component.
///
/// Conversions follow C++ `static_cast` as closely as Rust allows:
/// float to integer truncates toward zero and saturates at the type bounds.
pub trait Voxel:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// Tag describing how this type is stored on disk.
    const COMPONENT: ComponentType;

    /// The additive identity.
    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(self) -> bool {
        self == Self::default()
    }

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;

    /// Decode one sample from exactly `COMPONENT.size_of()` bytes.
    fn decode(bytes: &[u8], big_endian: bool) -> Self;

    /// Append the encoded sample to `out`.
    fn encode(self, big_endian: bool, out: &mut Vec<u8>);
}

macro_rules! impl_voxel {
    ($($t:ty => $tag:ident),* $(,)?) => {
        $(
            impl Voxel for $t {
                const COMPONENT: ComponentType = ComponentType::$tag;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    value as $t
                }

                #[inline]
                fn decode(bytes: &[u8], big_endian: bool) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                    if big_endian {
                        <$t>::from_be_bytes(raw)
                    } else {
                        <$t>::from_le_bytes(raw)
                    }
                }

                #[inline]
                fn encode(self, big_endian: bool, out: &mut Vec<u8>) {
                    if big_endian {
                        out.extend_from_slice(&self.to_be_bytes());
                    } else {
                        out.extend_from_slice(&self.to_le_bytes());
                    }
                }
            }
        )*
    };
}

impl_voxel! {
    u8 => UInt8,
    i8 => Int8,
    u16 => UInt16,
    i16 => Int16,
    u32 => UInt32,
    i32 => Int32,
    u64 => UInt64,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}
