//! Metric implementations.
//!
//! Similarity metrics used for atlas-to-patient registration.

pub mod trait_;
pub mod mse;
pub mod ncc;

pub use trait_::{FixedSamples, Metric, MovingImage};
pub use mse::MeanSquaredError;
pub use ncc::NormalizedCrossCorrelation;
