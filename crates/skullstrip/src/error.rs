//! Pipeline failures.
//!
//! Every variant is terminal. The codec errors keep their `anyhow` context
//! chain as the source so the binary can print the full cause.

use std::fmt;
use std::path::PathBuf;

use skullstrip_atlas::StripError;
use skullstrip_core::filter::GeometryMismatch;
use skullstrip_core::image::{ComponentType, PixelShape};
use thiserror::Error;

/// Pipeline step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Probe,
    Dispatch,
    Load,
    Strip,
    Mask,
    Write,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Dispatch => "dispatch",
            Self::Load => "load",
            Self::Strip => "strip",
            Self::Mask => "mask",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read the header of {}", .path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("unsupported pixel type: {pixel} {component} (only scalar short volumes are supported)")]
    UnsupportedComponentType { component: ComponentType, pixel: PixelShape },

    #[error("cannot load {role} volume {}", .path.display())]
    Load {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("brain extraction failed")]
    Strip(#[from] StripError),

    #[error("brain mask does not cover the patient grid")]
    MaskGeometryMismatch(#[from] GeometryMismatch),

    #[error("cannot write {role} volume {}", .path.display())]
    Write {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// Stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Probe { .. } => Stage::Probe,
            Self::UnsupportedComponentType { .. } => Stage::Dispatch,
            Self::Load { .. } => Stage::Load,
            Self::Strip(_) => Stage::Strip,
            Self::MaskGeometryMismatch(_) => Stage::Mask,
            Self::Write { .. } => Stage::Write,
        }
    }

    /// The message and every underlying cause, joined by `": "`.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        message
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
