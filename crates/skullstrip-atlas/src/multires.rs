use serde::{Deserialize, Serialize};
use skullstrip_core::filter::{center_of_mass, MultiResolutionPyramid};
use skullstrip_core::image::VoxelGrid;
use skullstrip_core::spatial::Point;
use skullstrip_core::transform::AffineTransform;

use crate::config::RegistrationConfig;
use crate::error::{Result, StripError};
use crate::metric::{FixedSamples, Metric};
use crate::optimizer::{RegularStepGradientDescent, StopCondition};
use crate::progress::ProgressTracker;
use crate::registration::{parameter_scales, AffineParameters, Registration};
use crate::validation::ConvergenceChecker;

/// Below this many samples a level is sampled densely regardless of stride.
const MIN_LEVEL_SAMPLES: usize = 512;

/// Outcome of one pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: usize,
    pub shrink_factor: usize,
    pub samples: usize,
    pub iterations: usize,
    pub metric_value: f64,
    pub stop: String,
}

/// Final transform and per-level history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResult {
    /// Maps patient physical points to atlas physical points.
    pub transform: AffineTransform,
    pub parameters: AffineParameters,
    pub center: Point<3>,
    pub metric_value: f64,
    pub levels: Vec<LevelSummary>,
}

/// Multi-resolution registration framework.
///
/// Registers coarse-to-fine over block-averaged pyramids of both images,
/// carrying the parameters from one level to the next.
pub struct MultiResolutionRegistration<M> {
    metric: M,
    config: RegistrationConfig,
}

impl<M> MultiResolutionRegistration<M>
where
    M: Metric + Clone,
{
    pub fn new(metric: M, config: RegistrationConfig) -> Self {
        Self { metric, config }
    }

    /// Moments initialization: translate the moving centre of mass onto the fixed one.
    ///
    /// Returns the rotation centre (fixed centre of mass) and the initial parameters.
    pub fn initialize(fixed: &VoxelGrid<f32>, moving: &VoxelGrid<f32>) -> (Point<3>, AffineParameters) {
        let fixed_center =
            center_of_mass(fixed, 0.0).unwrap_or_else(|| fixed.geometry().physical_center());
        let moving_center =
            center_of_mass(moving, 0.0).unwrap_or_else(|| moving.geometry().physical_center());
        tracing::info!(
            "Moments initialization: patient centre {:?}, atlas centre {:?}",
            fixed_center.to_array(),
            moving_center.to_array()
        );
        (fixed_center, AffineParameters::from_translation(moving_center - fixed_center))
    }

    /// Execute the multi-resolution registration.
    ///
    /// Progress is reported to `tracker` as overall completion within
    /// `progress_span`.
    pub fn execute(
        &self,
        fixed: &VoxelGrid<f32>,
        moving: &VoxelGrid<f32>,
        tracker: &ProgressTracker,
        progress_span: (f64, f64),
    ) -> Result<RegistrationResult> {
        let (center, mut params) = Self::initialize(fixed, moving);
        let radius = characteristic_radius(fixed);
        let scales = parameter_scales(radius);

        let factors = &self.config.shrink_factors;
        let fixed_pyramid = MultiResolutionPyramid::new(fixed, factors);
        let moving_pyramid = MultiResolutionPyramid::new(moving, factors);
        let levels = fixed_pyramid.levels();
        let (span_start, span_end) = progress_span;
        let fraction_at = |level: f64| span_start + (span_end - span_start) * level / levels as f64;

        let mut summaries = Vec::with_capacity(levels);
        let mut metric_value = f64::NAN;

        for level in 0..levels {
            let (Some(fixed_level), Some(moving_level)) = (fixed_pyramid.level(level), moving_pyramid.level(level))
            else {
                break;
            };

            let stage = format!("Registration level {}/{}", level + 1, levels);
            tracker.stage(&stage, fraction_at(level as f64));
            if tracker.should_abort() {
                return Err(StripError::Cancelled);
            }

            let mut samples = FixedSamples::from_grid(fixed_level, self.config.sampling_stride);
            if samples.len() < MIN_LEVEL_SAMPLES && self.config.sampling_stride > 1 {
                samples = FixedSamples::from_grid(fixed_level, 1);
            }

            let iterations = self.config.iterations_at(level);
            let max_step = self.config.max_step_length * 0.5f64.powi(level as i32);
            let min_step = self.config.min_step_length.min(max_step * 0.5);
            let optimizer = RegularStepGradientDescent::new(max_step, min_step, iterations)
                .with_relaxation_factor(self.config.relaxation_factor)
                .with_gradient_tolerance(self.config.gradient_tolerance)
                .with_scales(scales.clone())
                .with_convergence(ConvergenceChecker::new(
                    self.config.convergence_min_improvement,
                    self.config.convergence_patience,
                ));
            let derivative_step = 0.5 * fixed_level.spacing().min_spacing();

            tracing::info!(
                "Starting level {}/{} with shrink={}, samples={}, iters={}, step={:.3}mm",
                level + 1,
                levels,
                factors[level],
                samples.len(),
                iterations,
                max_step
            );
            tracing::info!("  Fixed size: {:?}", fixed_level.shape());
            tracing::info!("  Moving size: {:?}", moving_level.shape());

            let registration = Registration::new(optimizer, self.metric.clone());
            let mut observer = |state: &crate::optimizer::IterationState<'_>| {
                if tracker.should_abort() {
                    return Err(StripError::Cancelled);
                }
                let within = state.iteration as f64 / state.max_iterations.max(1) as f64;
                tracker.update(
                    &stage,
                    state.iteration,
                    Some(state.max_iterations),
                    state.value,
                    state.step_length,
                    fraction_at(level as f64 + within),
                );
                Ok(())
            };
            let (next, result) = registration.execute(
                &samples,
                moving_level,
                params,
                center,
                scales.clone(),
                derivative_step,
                &mut observer,
            )?;

            tracing::info!(
                "Level {}/{} finished after {} iterations ({}), {} = {:.6}",
                level + 1,
                levels,
                result.iterations,
                stop_name(result.stop),
                self.metric.name(),
                result.value
            );

            params = next;
            metric_value = result.value;
            summaries.push(LevelSummary {
                level,
                shrink_factor: factors[level],
                samples: samples.len(),
                iterations: result.iterations,
                metric_value: result.value,
                stop: stop_name(result.stop).to_string(),
            });
        }

        if !params.is_valid() {
            return Err(StripError::convergence_failure(format!(
                "registration produced a degenerate transform: {:?}",
                params
            )));
        }

        Ok(RegistrationResult {
            transform: params.to_transform(center),
            parameters: params,
            center,
            metric_value,
            levels: summaries,
        })
    }
}

/// Mean physical half-extent of the grid, in millimetres.
fn characteristic_radius(image: &VoxelGrid<f32>) -> f64 {
    let shape = image.shape();
    let spacing = image.spacing();
    (0..3).map(|a| shape[a] as f64 * spacing[a]).sum::<f64>() / 6.0
}

fn stop_name(stop: StopCondition) -> &'static str {
    match stop {
        StopCondition::MaximumIterations => "maximum iterations",
        StopCondition::StepTooSmall => "step too small",
        StopCondition::GradientTooSmall => "gradient too small",
        StopCondition::Converged => "converged",
    }
}
