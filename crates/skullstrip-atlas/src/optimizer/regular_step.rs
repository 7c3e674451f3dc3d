//! Regular-step gradient descent.
//!
//! Moves a fixed distance along the scaled negative gradient each
//! iteration. Whenever the gradient direction reverses between two
//! iterations the step is multiplied by the relaxation factor; the run
//! ends when the step or the gradient becomes too small.
//!
//! Parameter scales map each parameter to a common unit: a change of
//! `1 / scale[j]` in parameter `j` counts as one unit of step length.

use super::trait_::{ensure_finite, CostFunction, IterationState, OptimizationResult, Optimizer, StopCondition};
use crate::error::{Result, StripError};
use crate::validation::ConvergenceChecker;

#[derive(Debug, Clone)]
pub struct RegularStepGradientDescent {
    max_step_length: f64,
    min_step_length: f64,
    relaxation_factor: f64,
    gradient_tolerance: f64,
    max_iterations: usize,
    scales: Vec<f64>,
    convergence: Option<ConvergenceChecker>,
}

impl RegularStepGradientDescent {
    pub fn new(max_step_length: f64, min_step_length: f64, max_iterations: usize) -> Self {
        Self {
            max_step_length,
            min_step_length,
            relaxation_factor: 0.5,
            gradient_tolerance: 1e-8,
            max_iterations,
            scales: Vec::new(),
            convergence: None,
        }
    }

    pub fn with_relaxation_factor(mut self, factor: f64) -> Self {
        self.relaxation_factor = factor;
        self
    }

    pub fn with_gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = tolerance;
        self
    }

    /// Per-parameter scales; empty means all ones.
    pub fn with_scales(mut self, scales: Vec<f64>) -> Self {
        self.scales = scales;
        self
    }

    /// Stop early when the cost history plateaus.
    pub fn with_convergence(mut self, checker: ConvergenceChecker) -> Self {
        self.convergence = Some(checker);
        self
    }

    fn scales_for(&self, n: usize) -> Result<Vec<f64>> {
        if self.scales.is_empty() {
            return Ok(vec![1.0; n]);
        }
        if self.scales.len() != n {
            return Err(StripError::invalid_configuration(format!(
                "Expected {} parameter scales, got {}",
                n,
                self.scales.len()
            )));
        }
        if let Some(bad) = self.scales.iter().find(|s| !(**s > 0.0) || !s.is_finite()) {
            return Err(StripError::invalid_configuration(format!(
                "Parameter scales must be positive, got {}",
                bad
            )));
        }
        Ok(self.scales.clone())
    }
}

impl Optimizer for RegularStepGradientDescent {
    fn optimize<C: CostFunction>(
        &self,
        cost: &C,
        initial: &[f64],
        observer: &mut dyn FnMut(&IterationState<'_>) -> Result<()>,
    ) -> Result<OptimizationResult> {
        let n = cost.parameter_count();
        if initial.len() != n {
            return Err(StripError::invalid_configuration(format!(
                "Expected {} initial parameters, got {}",
                n,
                initial.len()
            )));
        }
        let scales = self.scales_for(n)?;

        let mut current = initial.to_vec();
        let mut best = current.clone();
        let mut best_value = f64::INFINITY;
        let mut step = self.max_step_length;
        let mut previous: Option<Vec<f64>> = None;
        let mut history = Vec::with_capacity(self.max_iterations);
        let mut stop = StopCondition::MaximumIterations;
        let mut iterations = 0;
        let mut evaluated_last = false;

        for iteration in 1..=self.max_iterations {
            iterations = iteration;
            let (value, gradient) = cost.value_and_gradient(&current)?;
            let value = ensure_finite(value, "cost")?;
            if let Some(g) = gradient.iter().find(|g| !g.is_finite()) {
                return Err(StripError::numerical_instability(format!("gradient is not finite: {}", g)));
            }
            if value < best_value {
                best_value = value;
                best.clone_from(&current);
            }
            history.push(value);

            let scaled: Vec<f64> = gradient.iter().zip(&scales).map(|(g, s)| g / s).collect();
            let magnitude = scaled.iter().map(|g| g * g).sum::<f64>().sqrt();

            if let Some(prev) = &previous {
                let dot: f64 = scaled.iter().zip(prev).map(|(a, b)| a * b).sum();
                if dot < 0.0 {
                    step *= self.relaxation_factor;
                }
            }

            observer(&IterationState {
                iteration,
                max_iterations: self.max_iterations,
                value,
                step_length: step,
                gradient_norm: magnitude,
                parameters: &current,
            })?;

            if step < self.min_step_length {
                stop = StopCondition::StepTooSmall;
                evaluated_last = true;
                break;
            }
            if !(magnitude > self.gradient_tolerance) {
                stop = StopCondition::GradientTooSmall;
                evaluated_last = true;
                break;
            }
            if let Some(checker) = &self.convergence {
                if checker.check_convergence(&history) {
                    stop = StopCondition::Converged;
                    evaluated_last = true;
                    break;
                }
            }

            let factor = step / magnitude;
            for ((p, g), s) in current.iter_mut().zip(&scaled).zip(&scales) {
                *p -= factor * g / s;
            }
            previous = Some(scaled);
        }

        if !evaluated_last {
            let value = ensure_finite(cost.value(&current)?, "cost")?;
            if value < best_value {
                best_value = value;
                best = current;
            }
        }

        tracing::debug!(
            "{} stopped after {} iterations ({:?}), cost {:.6e}",
            self.name(),
            iterations,
            stop,
            best_value
        );

        Ok(OptimizationResult {
            parameters: best,
            value: best_value,
            iterations,
            stop,
        })
    }

    fn name(&self) -> &'static str {
        "RegularStepGradientDescent"
    }
}
