pub mod mask;
pub mod morphology;
pub mod pyramid;
pub mod resample;
pub mod shrink;
pub mod statistics;

pub use mask::{apply_mask, GeometryMismatch, MaskImageFilter};
pub use pyramid::MultiResolutionPyramid;
pub use resample::ResampleImageFilter;
pub use shrink::ShrinkImageFilter;
pub use statistics::{center_of_mass, percentile, IntensityWindow};
