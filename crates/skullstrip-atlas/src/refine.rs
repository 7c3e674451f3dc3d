//! Label propagation and brain mask refinement.

use ndarray::{Array3, Zip};
use skullstrip_core::filter::{morphology, ResampleImageFilter};
use skullstrip_core::image::{ImageGeometry, VoxelGrid};
use skullstrip_core::interpolation::LinearInterpolator;
use skullstrip_core::transform::AffineTransform;

use crate::config::RefinementConfig;
use crate::error::{Result, StripError};

/// Pull the atlas brain indicator onto `geometry` through `transform`.
///
/// The indicator (label non-zero → 1) is interpolated trilinearly, so the
/// result is a brain probability in `[0, 1]`; points outside the atlas are 0.
pub fn propagate_label(
    label: &VoxelGrid<u8>,
    transform: &AffineTransform,
    geometry: ImageGeometry,
) -> Result<VoxelGrid<f32>> {
    let indicator = label.map(|v| if v != 0 { 1.0f32 } else { 0.0 });
    ResampleImageFilter::new(geometry, transform, LinearInterpolator::new())
        .with_default_pixel_value(0.0)
        .apply(&indicator)
        .ok_or_else(|| StripError::transform("atlas label direction is not invertible"))
}

/// Binary mask of voxels whose probability reaches `threshold`.
pub fn threshold_probability(probability: &Array3<f32>, threshold: f32) -> Array3<u8> {
    probability.mapv(|p| u8::from(p >= threshold))
}

/// Remove dark voxels from the mask boundary and regularize the shape.
///
/// `intensity` is the patient normalized to its robust window, so the
/// background threshold is simply `config.background_fraction`.
pub fn refine_mask(mask: &Array3<u8>, intensity: &Array3<f32>, config: &RefinementConfig) -> Array3<u8> {
    if !config.enabled {
        return mask.mapv(|v| u8::from(v != 0));
    }

    let mut refined = if config.band_radius > 0 {
        let interior = morphology::erode(mask, config.band_radius);
        let threshold = config.background_fraction;
        let mut trimmed = Array3::<u8>::zeros(mask.raw_dim());
        Zip::from(&mut trimmed)
            .and(mask)
            .and(&interior)
            .and(intensity)
            .par_for_each(|out, &m, &inner, &value| {
                let in_band = m != 0 && inner == 0;
                *out = u8::from(m != 0 && !(in_band && value < threshold));
            });
        let removed = mask.iter().filter(|&&v| v != 0).count() - trimmed.iter().filter(|&&v| v != 0).count();
        tracing::debug!("Boundary band trimming removed {} voxels", removed);
        trimmed
    } else {
        mask.mapv(|v| u8::from(v != 0))
    };

    if config.closing_radius > 0 {
        refined = morphology::closing(&refined, config.closing_radius);
    }
    if config.keep_largest_component {
        refined = morphology::largest_component(&refined);
    }
    if config.fill_holes {
        refined = morphology::fill_holes(&refined);
    }
    refined
}
