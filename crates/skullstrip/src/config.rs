use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skullstrip_atlas::StripConfig;

/// Everything one pipeline run needs, built once by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Patient scan to strip.
    pub patient_volume: PathBuf,
    /// Atlas intensity volume (short).
    pub atlas_volume: PathBuf,
    /// Atlas brain label (unsigned char).
    pub atlas_mask: PathBuf,
    /// Output brain mask on the patient grid.
    pub patient_mask: PathBuf,
    /// Output patient volume with non-brain voxels zeroed.
    pub patient_output: PathBuf,
    #[serde(default)]
    pub strip: StripConfig,
}

impl PipelineConfig {
    pub fn new(
        patient_volume: impl Into<PathBuf>,
        atlas_volume: impl Into<PathBuf>,
        atlas_mask: impl Into<PathBuf>,
        patient_mask: impl Into<PathBuf>,
        patient_output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            patient_volume: patient_volume.into(),
            atlas_volume: atlas_volume.into(),
            atlas_mask: atlas_mask.into(),
            patient_mask: patient_mask.into(),
            patient_output: patient_output.into(),
            strip: StripConfig::default(),
        }
    }

    pub fn with_strip(mut self, strip: StripConfig) -> Self {
        self.strip = strip;
        self
    }
}
