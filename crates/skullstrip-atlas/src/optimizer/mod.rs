//! Optimizers for transform parameters.
//!
//! Registration cost functions are minimized with derivative-free
//! gradients, so the optimizers here work on plain parameter vectors.

pub mod trait_;
pub mod regular_step;

pub use trait_::{CostFunction, IterationState, OptimizationResult, Optimizer, StopCondition};
pub use regular_step::RegularStepGradientDescent;
