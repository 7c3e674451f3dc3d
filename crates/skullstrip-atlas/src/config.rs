//! Tuning knobs for the atlas stripper.
//!
//! All configuration structs have working defaults and builder-style
//! `with_*` setters, and serialize so a run's settings can be printed or
//! stored next to its outputs.

use serde::{Deserialize, Serialize};

use crate::validation;
use crate::error::Result;

/// Similarity measure driving the atlas registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Mean of squared intensity differences.
    #[default]
    MeanSquares,
    /// Negated normalized cross correlation.
    Correlation,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MeanSquares => f.write_str("mean-squares"),
            Self::Correlation => f.write_str("correlation"),
        }
    }
}

/// Multi-resolution affine registration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Isotropic shrink factor per level, coarsest first.
    pub shrink_factors: Vec<usize>,
    /// Optimizer iterations per level; a single entry applies to every level.
    pub iterations: Vec<usize>,
    /// Use every `sampling_stride`-th voxel of the patient along each axis.
    pub sampling_stride: usize,
    pub metric: MetricKind,
    /// Largest optimizer step at the coarsest level, in millimetres.
    pub max_step_length: f64,
    /// The optimizer stops once the step falls below this, in millimetres.
    pub min_step_length: f64,
    /// Step reduction applied when the gradient changes direction.
    pub relaxation_factor: f64,
    pub gradient_tolerance: f64,
    /// Iterations without relative improvement before a level is considered converged.
    pub convergence_patience: usize,
    pub convergence_min_improvement: f64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            shrink_factors: vec![4, 2, 1],
            iterations: vec![100],
            sampling_stride: 2,
            metric: MetricKind::MeanSquares,
            max_step_length: 4.0,
            min_step_length: 0.01,
            relaxation_factor: 0.5,
            gradient_tolerance: 1e-8,
            convergence_patience: 30,
            convergence_min_improvement: 1e-6,
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shrink_factors(mut self, factors: Vec<usize>) -> Self {
        self.shrink_factors = factors;
        self
    }

    pub fn with_iterations(mut self, iterations: Vec<usize>) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_sampling_stride(mut self, stride: usize) -> Self {
        self.sampling_stride = stride;
        self
    }

    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Set the maximum and minimum optimizer step, in millimetres.
    pub fn with_step_lengths(mut self, max: f64, min: f64) -> Self {
        self.max_step_length = max;
        self.min_step_length = min;
        self
    }

    /// Iteration budget of `level`.
    pub fn iterations_at(&self, level: usize) -> usize {
        match self.iterations.as_slice() {
            [single] => *single,
            many => many.get(level).copied().unwrap_or(0),
        }
    }
}

/// Post-propagation mask cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    pub enabled: bool,
    /// Width of the boundary band that may be trimmed, in voxels.
    pub band_radius: usize,
    /// Background threshold as a fraction of the robust intensity window.
    pub background_fraction: f32,
    pub closing_radius: usize,
    pub keep_largest_component: bool,
    pub fill_holes: bool,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            band_radius: 2,
            background_fraction: 0.1,
            closing_radius: 1,
            keep_largest_component: true,
            fill_holes: true,
        }
    }
}

impl RefinementConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that leaves the propagated mask untouched.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_band_radius(mut self, radius: usize) -> Self {
        self.band_radius = radius;
        self
    }

    pub fn with_background_fraction(mut self, fraction: f32) -> Self {
        self.background_fraction = fraction;
        self
    }

    pub fn with_closing_radius(mut self, radius: usize) -> Self {
        self.closing_radius = radius;
        self
    }
}

/// Complete stripper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub registration: RegistrationConfig,
    pub refinement: RefinementConfig,
    /// Propagated brain probability at or above which a voxel is brain.
    pub probability_threshold: f32,
    /// Value written to brain voxels of the output mask.
    pub brain_value: u8,
    /// Percentiles of the robust intensity window.
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            registration: RegistrationConfig::default(),
            refinement: RefinementConfig::default(),
            probability_threshold: 0.5,
            brain_value: 1,
            lower_percentile: 2.0,
            upper_percentile: 98.0,
        }
    }
}

impl StripConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registration(mut self, registration: RegistrationConfig) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_refinement(mut self, refinement: RefinementConfig) -> Self {
        self.refinement = refinement;
        self
    }

    pub fn with_probability_threshold(mut self, threshold: f32) -> Self {
        self.probability_threshold = threshold;
        self
    }

    pub fn with_brain_value(mut self, value: u8) -> Self {
        self.brain_value = value;
        self
    }

    /// Check every setting; see [`validation::validate_strip_config`].
    pub fn validate(&self) -> Result<()> {
        validation::validate_strip_config(self)
    }
}
