//! Single-resolution affine registration.
//!
//! The patient is the fixed image and the atlas the moving image. The
//! registered transform maps patient physical points to atlas physical
//! points, which is the direction needed to pull atlas labels onto the
//! patient grid.

use serde::{Deserialize, Serialize};
use skullstrip_core::image::VoxelGrid;
use skullstrip_core::spatial::{Point, Vector};
use skullstrip_core::transform::AffineTransform;

use crate::error::{Result, StripError};
use crate::metric::{FixedSamples, Metric, MovingImage};
use crate::optimizer::{CostFunction, IterationState, OptimizationResult, Optimizer};

/// Number of affine parameters: 3 rotations, 3 translations, 3 scales.
pub const PARAMETER_COUNT: usize = 9;

/// Rotation (radians), translation (mm) and per-axis scale about a fixed centre.
///
/// Flattened as `[rx, ry, rz, tx, ty, tz, sx, sy, sz]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineParameters {
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    pub scale: [f64; 3],
}

impl Default for AffineParameters {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineParameters {
    pub fn identity() -> Self {
        Self {
            rotation: [0.0; 3],
            translation: [0.0; 3],
            scale: [1.0; 3],
        }
    }

    pub fn from_translation(translation: Vector<3>) -> Self {
        Self {
            translation: translation.to_array(),
            ..Self::identity()
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(PARAMETER_COUNT);
        v.extend_from_slice(&self.rotation);
        v.extend_from_slice(&self.translation);
        v.extend_from_slice(&self.scale);
        v
    }

    pub fn from_slice(p: &[f64]) -> Result<Self> {
        if p.len() != PARAMETER_COUNT {
            return Err(StripError::transform(format!(
                "Expected {} affine parameters, got {}",
                PARAMETER_COUNT,
                p.len()
            )));
        }
        Ok(Self {
            rotation: [p[0], p[1], p[2]],
            translation: [p[3], p[4], p[5]],
            scale: [p[6], p[7], p[8]],
        })
    }

    /// All scales finite and positive.
    pub fn is_valid(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite()) && self.scale.iter().all(|&s| s > 0.0)
    }

    pub fn to_transform(&self, center: Point<3>) -> AffineTransform {
        AffineTransform::from_euler_scale(self.rotation, self.scale, Vector::new(self.translation), center)
    }
}

/// Optimizer scales for a field of view of the given radius (mm).
///
/// A rotation or scale change of `1 / radius` moves a point on the radius
/// by about one millimetre, the same as a unit translation.
pub fn parameter_scales(radius: f64) -> Vec<f64> {
    let r = radius.max(1.0);
    vec![r, r, r, 1.0, 1.0, 1.0, r, r, r]
}

/// Registration cost over affine parameters.
pub struct AffineRegistrationCost<'a, M: Metric> {
    metric: &'a M,
    fixed: &'a FixedSamples,
    moving: MovingImage<'a>,
    center: Point<3>,
    scales: Vec<f64>,
    /// Finite-difference step in millimetres.
    derivative_step: f64,
}

impl<'a, M: Metric> AffineRegistrationCost<'a, M> {
    pub fn new(
        metric: &'a M,
        fixed: &'a FixedSamples,
        moving: &'a VoxelGrid<f32>,
        center: Point<3>,
        scales: Vec<f64>,
        derivative_step: f64,
    ) -> Result<Self> {
        Ok(Self {
            metric,
            fixed,
            moving: MovingImage::new(moving)?,
            center,
            scales,
            derivative_step,
        })
    }
}

impl<M: Metric> CostFunction for AffineRegistrationCost<'_, M> {
    fn parameter_count(&self) -> usize {
        PARAMETER_COUNT
    }

    fn value(&self, parameters: &[f64]) -> Result<f64> {
        let params = AffineParameters::from_slice(parameters)?;
        let transform = params.to_transform(self.center);
        self.metric.evaluate(self.fixed, &self.moving, &transform)
    }

    fn derivative_step(&self, index: usize) -> f64 {
        self.derivative_step / self.scales.get(index).copied().unwrap_or(1.0)
    }
}

/// One registration run at a single resolution.
pub struct Registration<M, O>
where
    M: Metric,
    O: Optimizer,
{
    optimizer: O,
    metric: M,
}

impl<M, O> Registration<M, O>
where
    M: Metric,
    O: Optimizer,
{
    pub fn new(optimizer: O, metric: M) -> Self {
        Self { optimizer, metric }
    }

    /// Register `moving` to `fixed` starting from `initial`.
    ///
    /// `scales` must be the optimizer's parameter scales; they set the
    /// finite-difference step of each parameter.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        fixed: &FixedSamples,
        moving: &VoxelGrid<f32>,
        initial: AffineParameters,
        center: Point<3>,
        scales: Vec<f64>,
        derivative_step: f64,
        observer: &mut dyn FnMut(&IterationState<'_>) -> Result<()>,
    ) -> Result<(AffineParameters, OptimizationResult)> {
        let cost = AffineRegistrationCost::new(&self.metric, fixed, moving, center, scales, derivative_step)?;
        let result = self.optimizer.optimize(&cost, &initial.to_vec(), observer)?;
        let params = AffineParameters::from_slice(&result.parameters)?;
        Ok((params, result))
    }
}
