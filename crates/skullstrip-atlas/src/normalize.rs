//! Robust intensity normalization.
//!
//! Patient and atlas scans come from different scanners and protocols, so
//! both are mapped to `[0, 1]` through a percentile window before they are
//! compared. Outliers beyond the window saturate.

use ndarray::Zip;
use skullstrip_core::filter::IntensityWindow;
use skullstrip_core::image::{Voxel, VoxelGrid};

/// A volume mapped to `[0, 1]` and the window that mapped it.
#[derive(Debug, Clone)]
pub struct NormalizedVolume {
    pub image: VoxelGrid<f32>,
    pub window: IntensityWindow,
}

/// Normalize `volume` between its `lower_pct` and `upper_pct` percentiles.
pub fn normalize_intensity<T: Voxel>(volume: &VoxelGrid<T>, lower_pct: f64, upper_pct: f64) -> NormalizedVolume {
    let raw = volume.to_f32();
    let window = IntensityWindow::from_percentiles(raw.data(), lower_pct, upper_pct);
    let data = Zip::from(raw.data()).par_map_collect(|&v| window.normalize(v));
    tracing::debug!(
        "Intensity window [{:.3}, {:.3}] over {} voxels",
        window.lower,
        window.upper,
        raw.len()
    );
    NormalizedVolume {
        image: VoxelGrid::new(data, raw.metadata().clone()),
        window,
    }
}
