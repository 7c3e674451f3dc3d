//! Swiss skull stripper.
//!
//! Removes non-brain tissue from a patient MRI volume using an atlas
//! intensity volume and its brain label. The pipeline writes the brain mask
//! and the patient volume with everything outside the mask set to zero.
//!
//! ```rust,no_run
//! use skullstrip::{run, FileCodec, PipelineConfig};
//! use skullstrip_atlas::{AtlasStripper, ProgressTracker};
//!
//! # fn main() -> Result<(), skullstrip::PipelineError> {
//! let config = PipelineConfig::new(
//!     "patient.nii.gz",
//!     "SwissSkullStripperAtlasImage.mha",
//!     "SwissSkullStripperAtlasMask.mha",
//!     "patient_mask.nii.gz",
//!     "patient_brain.nii.gz",
//! );
//! let stripper = AtlasStripper::new(config.strip.clone());
//! let summary = run(&config, &FileCodec, &stripper, &ProgressTracker::new())?;
//! println!("{} brain voxels", summary.brain_voxels);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress_bar;

pub use codec::{FileCodec, VolumeCodec};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result, Stage};
pub use pipeline::{dispatch, run, run_typed, PipelineState, RunState, RunSummary};
pub use progress_bar::ProgressBarCallback;
