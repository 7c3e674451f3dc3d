//! Validation utilities for skull stripping.
//!
//! Input volumes and configurations are checked up front so the
//! registration loop never sees degenerate geometry or settings.

use skullstrip_core::image::{Voxel, VoxelGrid};

use crate::config::{RegistrationConfig, StripConfig};
use crate::error::{Result, StripError};

/// Smallest accepted `|det(direction)|`.
const MIN_DIRECTION_DETERMINANT: f64 = 1e-6;

/// Validate that a volume has voxels and a usable physical geometry.
pub fn validate_volume<T: Voxel>(name: &str, volume: &VoxelGrid<T>) -> Result<()> {
    if volume.is_empty() {
        return Err(StripError::image_validation(format!(
            "{} volume is empty (size {:?})",
            name,
            volume.shape()
        )));
    }

    let spacing = volume.spacing();
    if !spacing.is_valid() {
        return Err(StripError::image_validation(format!(
            "{} volume has non-positive spacing {:?}",
            name,
            spacing.to_array()
        )));
    }

    let det = volume.direction().determinant();
    if !det.is_finite() || det.abs() < MIN_DIRECTION_DETERMINANT {
        return Err(StripError::image_validation(format!(
            "{} volume has a singular direction matrix (det = {:.3e})",
            name, det
        )));
    }

    if volume.origin().to_array().iter().any(|v| !v.is_finite()) {
        return Err(StripError::image_validation(format!("{} volume has a non-finite origin", name)));
    }

    Ok(())
}

/// Validate that a volume has at least two distinct finite intensities.
pub fn validate_contrast<T: Voxel>(name: &str, volume: &VoxelGrid<T>) -> Result<()> {
    let mut values = volume.data().iter().map(|v| v.to_f64()).filter(|v| v.is_finite());
    let Some(first) = values.next() else {
        return Err(StripError::image_validation(format!("{} volume has no finite intensities", name)));
    };
    if values.all(|v| v == first) {
        return Err(StripError::image_validation(format!(
            "{} volume has constant intensity {}",
            name, first
        )));
    }
    Ok(())
}

/// Validate that the atlas label marks at least one brain voxel.
pub fn validate_label(label: &VoxelGrid<u8>) -> Result<()> {
    validate_volume("atlas label", label)?;
    if label.count_nonzero() == 0 {
        return Err(StripError::image_validation("atlas label has no brain voxels"));
    }
    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(StripError::invalid_configuration("Iterations must be positive"));
    }

    if iterations > 1_000_000 {
        return Err(StripError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }

    Ok(())
}

/// Validate optimizer step lengths.
pub fn validate_step_lengths(max: f64, min: f64) -> Result<()> {
    if !(min > 0.0) || !max.is_finite() {
        return Err(StripError::invalid_configuration(format!(
            "Step lengths must be positive and finite, got max {} and min {}",
            max, min
        )));
    }
    if min >= max {
        return Err(StripError::invalid_configuration(format!(
            "Minimum step length ({}) must be less than maximum step length ({})",
            min, max
        )));
    }
    Ok(())
}

/// Validate the multi-resolution registration settings.
pub fn validate_registration_config(config: &RegistrationConfig) -> Result<()> {
    if config.shrink_factors.is_empty() {
        return Err(StripError::invalid_configuration("At least one resolution level is required"));
    }
    if let Some(factor) = config.shrink_factors.iter().find(|&&f| f == 0) {
        return Err(StripError::invalid_configuration(format!(
            "Shrink factors must be at least 1, got {}",
            factor
        )));
    }

    let levels = config.shrink_factors.len();
    if config.iterations.len() != 1 && config.iterations.len() != levels {
        return Err(StripError::invalid_configuration(format!(
            "Expected 1 or {} iteration counts, got {}",
            levels,
            config.iterations.len()
        )));
    }
    for &iterations in &config.iterations {
        validate_iterations(iterations)?;
    }

    if config.sampling_stride == 0 {
        return Err(StripError::invalid_configuration("Sampling stride must be at least 1"));
    }

    validate_step_lengths(config.max_step_length, config.min_step_length)?;

    if !(config.relaxation_factor > 0.0 && config.relaxation_factor < 1.0) {
        return Err(StripError::invalid_configuration(format!(
            "Relaxation factor must be in (0, 1), got {}",
            config.relaxation_factor
        )));
    }
    if !(config.gradient_tolerance >= 0.0) {
        return Err(StripError::invalid_configuration(format!(
            "Gradient tolerance must be non-negative, got {}",
            config.gradient_tolerance
        )));
    }

    Ok(())
}

/// Validate a complete stripper configuration.
pub fn validate_strip_config(config: &StripConfig) -> Result<()> {
    validate_registration_config(&config.registration)?;

    if !(config.probability_threshold > 0.0 && config.probability_threshold <= 1.0) {
        return Err(StripError::invalid_configuration(format!(
            "Probability threshold must be in (0, 1], got {}",
            config.probability_threshold
        )));
    }
    if config.brain_value == 0 {
        return Err(StripError::invalid_configuration("Brain mask value must be non-zero"));
    }
    if !(0.0..100.0).contains(&config.lower_percentile)
        || !(config.lower_percentile < config.upper_percentile && config.upper_percentile <= 100.0)
    {
        return Err(StripError::invalid_configuration(format!(
            "Invalid intensity percentiles [{}, {}]",
            config.lower_percentile, config.upper_percentile
        )));
    }
    if !(0.0..1.0).contains(&config.refinement.background_fraction) {
        return Err(StripError::invalid_configuration(format!(
            "Background fraction must be in [0, 1), got {}",
            config.refinement.background_fraction
        )));
    }

    Ok(())
}

/// Check for convergence based on metric history.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    /// Minimum relative improvement to keep going.
    pub min_improvement: f64,
    /// Number of iterations to check for improvement.
    pub patience: usize,
    /// Metric value at which the optimization counts as converged.
    pub min_loss: Option<f64>,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self {
            min_improvement: 1e-6,
            patience: 50,
            min_loss: None,
        }
    }
}

impl ConvergenceChecker {
    /// Create a new convergence checker.
    pub fn new(min_improvement: f64, patience: usize) -> Self {
        Self {
            min_improvement,
            patience,
            min_loss: None,
        }
    }

    /// Set minimum loss threshold.
    pub fn with_min_loss(mut self, min_loss: f64) -> Self {
        self.min_loss = Some(min_loss);
        self
    }

    /// Whether the last `patience` values improved on the value before
    /// them by less than `min_improvement` (relative).
    pub fn check_convergence(&self, loss_history: &[f64]) -> bool {
        let Some(&current) = loss_history.last() else {
            return false;
        };

        if let Some(min_loss) = self.min_loss {
            if current < min_loss {
                return true;
            }
        }

        if self.patience == 0 || loss_history.len() < self.patience + 1 {
            return false;
        }

        let reference = loss_history[loss_history.len() - self.patience - 1];
        let best_recent = loss_history[loss_history.len() - self.patience..]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);

        let relative_improvement = (reference - best_recent) / (reference.abs() + 1e-10);
        relative_improvement < self.min_improvement
    }
}
