//! Atlas-based brain extraction.
//!
//! [`AtlasStripper`] registers an atlas intensity volume to the patient,
//! carries the atlas brain label across with the registered transform and
//! cleans the propagated mask up against the patient intensities.

use skullstrip_core::image::{Voxel, VoxelGrid};

use crate::config::{MetricKind, StripConfig};
use crate::error::{Result, StripError};
use crate::metric::{MeanSquaredError, Metric, NormalizedCrossCorrelation};
use crate::multires::{MultiResolutionRegistration, RegistrationResult};
use crate::normalize::normalize_intensity;
use crate::progress::ProgressTracker;
use crate::refine::{propagate_label, refine_mask, threshold_probability};
use crate::validation;

/// Produces a binary brain mask on the patient grid.
pub trait BrainStripper {
    /// Brain mask with the patient's geometry; brain voxels non-zero.
    fn strip<T: Voxel>(
        &self,
        patient: &VoxelGrid<T>,
        atlas: &VoxelGrid<i16>,
        label: &VoxelGrid<u8>,
        tracker: &ProgressTracker,
    ) -> Result<VoxelGrid<u8>>;
}

/// Mask plus the registration that produced it.
#[derive(Debug, Clone)]
pub struct StripResult {
    pub mask: VoxelGrid<u8>,
    pub registration: RegistrationResult,
    /// Brain voxels before refinement.
    pub propagated_voxels: usize,
}

/// Skull stripper driven by an affinely registered atlas.
#[derive(Debug, Clone, Default)]
pub struct AtlasStripper {
    config: StripConfig,
}

impl AtlasStripper {
    pub fn new(config: StripConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StripConfig {
        &self.config
    }

    /// Run the full stripping workflow and keep the intermediate results.
    pub fn run<T: Voxel>(
        &self,
        patient: &VoxelGrid<T>,
        atlas: &VoxelGrid<i16>,
        label: &VoxelGrid<u8>,
        tracker: &ProgressTracker,
    ) -> Result<StripResult> {
        tracker.start();
        let result = self.run_stages(patient, atlas, label, tracker);
        match &result {
            Ok(done) => tracker.complete(done.registration.metric_value),
            Err(err) => tracker.error(&err.to_string()),
        }
        result
    }

    fn run_stages<T: Voxel>(
        &self,
        patient: &VoxelGrid<T>,
        atlas: &VoxelGrid<i16>,
        label: &VoxelGrid<u8>,
        tracker: &ProgressTracker,
    ) -> Result<StripResult> {
        let config = &self.config;
        config.validate()?;
        validation::validate_volume("patient", patient)?;
        validation::validate_contrast("patient", patient)?;
        validation::validate_volume("atlas", atlas)?;
        validation::validate_contrast("atlas", atlas)?;
        validation::validate_label(label)?;

        checkpoint(tracker, "Intensity normalization", 0.0)?;
        let patient_norm = normalize_intensity(patient, config.lower_percentile, config.upper_percentile);
        let atlas_norm = normalize_intensity(atlas, config.lower_percentile, config.upper_percentile);
        tracing::info!(
            "Patient window [{:.1}, {:.1}], atlas window [{:.1}, {:.1}]",
            patient_norm.window.lower,
            patient_norm.window.upper,
            atlas_norm.window.lower,
            atlas_norm.window.upper
        );

        let registration = match config.registration.metric {
            MetricKind::MeanSquares => {
                self.register(MeanSquaredError::new(), &patient_norm.image, &atlas_norm.image, tracker)?
            }
            MetricKind::Correlation => {
                self.register(NormalizedCrossCorrelation::new(), &patient_norm.image, &atlas_norm.image, tracker)?
            }
        };
        tracing::info!(
            "Registration finished: rotation {:?}, translation {:?}, scale {:?}",
            registration.parameters.rotation,
            registration.parameters.translation,
            registration.parameters.scale
        );

        checkpoint(tracker, "Label propagation", 0.9)?;
        let probability = propagate_label(label, &registration.transform, patient.geometry())?;
        let propagated = threshold_probability(probability.data(), config.probability_threshold);
        let propagated_voxels = propagated.iter().filter(|&&v| v != 0).count();
        tracing::info!("Propagated atlas label covers {} voxels", propagated_voxels);

        checkpoint(tracker, "Mask refinement", 0.95)?;
        let refined = refine_mask(&propagated, patient_norm.image.data(), &config.refinement);

        let brain = config.brain_value;
        let mask = VoxelGrid::new(refined.mapv(|v| if v != 0 { brain } else { 0 }), patient.metadata().clone());
        let voxels = mask.count_nonzero();
        if voxels == 0 {
            return Err(StripError::EmptyMask);
        }
        tracing::info!(
            "Brain mask: {} voxels ({:.1}% of the patient volume)",
            voxels,
            100.0 * voxels as f64 / mask.len() as f64
        );

        Ok(StripResult {
            mask,
            registration,
            propagated_voxels,
        })
    }

    fn register<M: Metric + Clone>(
        &self,
        metric: M,
        patient: &VoxelGrid<f32>,
        atlas: &VoxelGrid<f32>,
        tracker: &ProgressTracker,
    ) -> Result<RegistrationResult> {
        tracing::info!("Affine atlas registration with {}", metric.name());
        MultiResolutionRegistration::new(metric, self.config.registration.clone())
            .execute(patient, atlas, tracker, (0.05, 0.9))
    }
}

impl BrainStripper for AtlasStripper {
    fn strip<T: Voxel>(
        &self,
        patient: &VoxelGrid<T>,
        atlas: &VoxelGrid<i16>,
        label: &VoxelGrid<u8>,
        tracker: &ProgressTracker,
    ) -> Result<VoxelGrid<u8>> {
        self.run(patient, atlas, label, tracker).map(|result| result.mask)
    }
}

/// Announce a phase and honour a pending cancellation.
fn checkpoint(tracker: &ProgressTracker, stage: &str, fraction: f64) -> Result<()> {
    if tracker.should_abort() {
        return Err(StripError::Cancelled);
    }
    tracker.stage(stage, fraction);
    Ok(())
}
