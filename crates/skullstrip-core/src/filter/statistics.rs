//! Intensity statistics used to normalize and initialize registration.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::image::VoxelGrid;
use crate::spatial::Point;

/// Nearest-rank percentile of an ascending slice; `p` in `[0, 100]`.
pub fn percentile(sorted: &[f32], p: f64) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// All finite samples of `data`, sorted ascending.
pub fn sorted_samples(data: &Array3<f32>) -> Vec<f32> {
    let mut samples: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    samples.sort_by(f32::total_cmp);
    samples
}

/// Intensity range between two percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityWindow {
    pub lower: f32,
    pub upper: f32,
}

impl IntensityWindow {
    pub fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    /// Window between the `lower_pct` and `upper_pct` percentiles of `data`.
    pub fn from_percentiles(data: &Array3<f32>, lower_pct: f64, upper_pct: f64) -> Self {
        let sorted = sorted_samples(data);
        Self::new(percentile(&sorted, lower_pct), percentile(&sorted, upper_pct))
    }

    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// `lower + fraction * width`
    pub fn threshold(&self, fraction: f32) -> f32 {
        self.lower + fraction * self.width()
    }

    /// Map `value` linearly so the window spans `[0, 1]`, clamping outside.
    ///
    /// A degenerate window maps to `0` at or below `lower` and `1` above it.
    pub fn normalize(&self, value: f32) -> f32 {
        let width = self.width();
        if !(width > 0.0) {
            return if value > self.lower { 1.0 } else { 0.0 };
        }
        ((value - self.lower) / width).clamp(0.0, 1.0)
    }
}

/// Intensity-weighted centre of mass in physical space.
///
/// Only voxels brighter than `threshold` (and positive) contribute.
/// Returns `None` when no voxel does.
pub fn center_of_mass(grid: &VoxelGrid<f32>, threshold: f32) -> Option<Point<3>> {
    let mut weighted = [0.0f64; 3];
    let mut total = 0.0f64;
    for ((i, j, k), &value) in grid.data().indexed_iter() {
        if value > threshold && value > 0.0 {
            let w = value as f64;
            weighted[0] += w * i as f64;
            weighted[1] += w * j as f64;
            weighted[2] += w * k as f64;
            total += w;
        }
    }
    if total <= 0.0 {
        return None;
    }
    let index = Point::new(weighted.map(|s| s / total));
    Some(grid.index_to_physical_point(&index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageMetadata;
    use crate::spatial::{Direction3, Point3, Spacing3};

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        assert_eq!(percentile(&sorted, 2.0), 2.0);
        assert_eq!(percentile(&sorted, 98.0), 98.0);
        assert_eq!(percentile(&sorted, 150.0), 100.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_window_ignores_outliers() {
        let mut data = Array3::from_shape_fn((10, 10, 1), |(i, j, _)| (i * 10 + j) as f32);
        data[(9, 9, 0)] = 1.0e6;
        let window = IntensityWindow::from_percentiles(&data, 2.0, 98.0);
        assert_eq!(window.lower, 2.0);
        assert_eq!(window.upper, 97.0);
        assert_eq!(window.normalize(1.0e6), 1.0);
        assert_eq!(window.normalize(-5.0), 0.0);
        assert!((window.threshold(0.1) - 11.5).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_window() {
        let window = IntensityWindow::new(3.0, 3.0);
        assert_eq!(window.normalize(3.0), 0.0);
        assert_eq!(window.normalize(4.0), 1.0);
    }

    #[test]
    fn test_center_of_mass_physical() {
        let metadata = ImageMetadata::new(
            Point3::new([100.0, 0.0, 0.0]),
            Spacing3::uniform(2.0),
            Direction3::identity(),
        );
        let mut grid = VoxelGrid::from_elem([5, 5, 5], 0.0f32, metadata);
        let mut data = grid.clone().into_data();
        data[(1, 2, 3)] = 1.0;
        data[(3, 2, 3)] = 1.0;
        grid = VoxelGrid::new(data, grid.metadata().clone());
        let com = center_of_mass(&grid, 0.5).expect("foreground");
        assert_eq!(com, Point3::new([104.0, 4.0, 6.0]));
        assert!(center_of_mass(&grid, 2.0).is_none());
    }
}
