//! Error types for atlas-based skull stripping.
//!
//! Every failure the stripper can report is one of these variants, so
//! callers can map them to a stage-level error without string matching.

use thiserror::Error;

/// Main error type for stripping operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StripError {
    /// An input volume cannot be used (empty, degenerate geometry, no contrast).
    #[error("Image validation error: {0}")]
    ImageValidation(String),

    /// The stripper configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error in metric evaluation.
    #[error("Metric error: {0}")]
    Metric(String),

    /// Error in a spatial transform.
    #[error("Transform error: {0}")]
    Transform(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Registration ended in an unusable state.
    #[error("Convergence failure: {0}")]
    ConvergenceFailure(String),

    /// The propagated brain mask has no voxels.
    #[error("Brain mask is empty after label propagation")]
    EmptyMask,

    /// A progress monitor asked the stripper to stop.
    #[error("Skull stripping was cancelled")]
    Cancelled,
}

/// Result type for stripping operations.
pub type Result<T> = std::result::Result<T, StripError>;

impl StripError {
    /// Create an image validation error.
    pub fn image_validation(msg: impl Into<String>) -> Self {
        Self::ImageValidation(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a metric error.
    pub fn metric(msg: impl Into<String>) -> Self {
        Self::Metric(msg.into())
    }

    /// Create a transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    /// Create a convergence failure error.
    pub fn convergence_failure(msg: impl Into<String>) -> Self {
        Self::ConvergenceFailure(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StripError::metric("too few samples");
        assert!(matches!(err, StripError::Metric(_)));
    }

    #[test]
    fn test_error_display() {
        let err = StripError::image_validation("patient volume is empty");
        assert_eq!(err.to_string(), "Image validation error: patient volume is empty");
        assert_eq!(StripError::Cancelled.to_string(), "Skull stripping was cancelled");
    }
}
