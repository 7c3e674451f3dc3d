//! Atlas-based skull stripping.
//!
//! Registers an atlas intensity volume to a patient volume with a
//! multi-resolution affine registration, propagates the atlas brain label
//! onto the patient grid and refines the result against the patient
//! intensities.
//!
//! ```rust,no_run
//! use skullstrip_atlas::{AtlasStripper, BrainStripper, ProgressTracker, StripConfig};
//! # fn demo(
//! #     patient: &skullstrip_core::VoxelGrid<i16>,
//! #     atlas: &skullstrip_core::VoxelGrid<i16>,
//! #     label: &skullstrip_core::VoxelGrid<u8>,
//! # ) -> skullstrip_atlas::Result<()> {
//! let stripper = AtlasStripper::new(StripConfig::default());
//! let mask = stripper.strip(patient, atlas, label, &ProgressTracker::new())?;
//! assert!(mask.same_geometry(patient));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metric;
pub mod multires;
pub mod normalize;
pub mod optimizer;
pub mod progress;
pub mod refine;
pub mod registration;
pub mod strip;
pub mod validation;

pub use config::{MetricKind, RefinementConfig, RegistrationConfig, StripConfig};
pub use error::{Result, StripError};
pub use multires::{LevelSummary, MultiResolutionRegistration, RegistrationResult};
pub use progress::{
    CancellationCallback, ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker,
};
pub use strip::{AtlasStripper, BrainStripper, StripResult};
pub use validation::ConvergenceChecker;
