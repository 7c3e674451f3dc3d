//! Optimizer trait for parameter optimization.
//!
//! Registration minimizes a scalar [`CostFunction`] of the transform
//! parameters. Optimizers only see parameter vectors, never images.

use crate::error::{Result, StripError};

/// Scalar function of a parameter vector.
pub trait CostFunction: Sync {
    /// Length of the parameter vector.
    fn parameter_count(&self) -> usize;

    /// Cost at `parameters`.
    fn value(&self, parameters: &[f64]) -> Result<f64>;

    /// Finite-difference step for parameter `index`.
    fn derivative_step(&self, _index: usize) -> f64 {
        1e-3
    }

    /// Cost and its gradient, by central differences unless overridden.
    fn value_and_gradient(&self, parameters: &[f64]) -> Result<(f64, Vec<f64>)> {
        let value = self.value(parameters)?;
        let mut probe = parameters.to_vec();
        let mut gradient = Vec::with_capacity(parameters.len());
        for j in 0..parameters.len() {
            let h = self.derivative_step(j);
            probe[j] = parameters[j] + h;
            let forward = self.value(&probe)?;
            probe[j] = parameters[j] - h;
            let backward = self.value(&probe)?;
            probe[j] = parameters[j];
            gradient.push((forward - backward) / (2.0 * h));
        }
        Ok((value, gradient))
    }
}

/// State reported to the observer after each iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationState<'a> {
    /// One-based iteration number.
    pub iteration: usize,
    pub max_iterations: usize,
    pub value: f64,
    pub step_length: f64,
    pub gradient_norm: f64,
    pub parameters: &'a [f64],
}

/// Why an optimization stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    MaximumIterations,
    StepTooSmall,
    GradientTooSmall,
    Converged,
}

/// Outcome of one optimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Best parameters seen.
    pub parameters: Vec<f64>,
    /// Cost at `parameters`.
    pub value: f64,
    pub iterations: usize,
    pub stop: StopCondition,
}

/// Optimizer trait for cost minimization.
///
/// The observer runs after every iteration; an error from it (for example
/// a cancellation) aborts the optimization and is returned unchanged.
pub trait Optimizer {
    fn optimize<C: CostFunction>(
        &self,
        cost: &C,
        initial: &[f64],
        observer: &mut dyn FnMut(&IterationState<'_>) -> Result<()>,
    ) -> Result<OptimizationResult>;

    fn name(&self) -> &'static str;
}

/// Fail on NaN or infinite cost values.
pub(crate) fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StripError::numerical_instability(format!("{} is not finite: {}", what, value)))
    }
}
