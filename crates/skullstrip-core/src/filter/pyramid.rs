use crate::image::VoxelGrid;

use super::shrink::ShrinkImageFilter;

/// Multi-resolution image pyramid.
///
/// Holds one block-averaged copy of the input per shrink factor, in the
/// order the factors were given (coarsest first by convention).
#[derive(Debug, Clone)]
pub struct MultiResolutionPyramid {
    images: Vec<VoxelGrid<f32>>,
}

impl MultiResolutionPyramid {
    /// Create a pyramid from an input image and per-level isotropic shrink factors.
    pub fn new(input: &VoxelGrid<f32>, shrink_factors: &[usize]) -> Self {
        let images = shrink_factors
            .iter()
            .map(|&factor| ShrinkImageFilter::uniform(factor).apply(input))
            .collect();
        Self { images }
    }

    /// Image at a specific level, `None` past the last one.
    pub fn level(&self, level: usize) -> Option<&VoxelGrid<f32>> {
        self.images.get(level)
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }

    /// Default schedule for `levels` levels with power-of-two shrinking,
    /// coarsest first: `levels = 3` gives `[4, 2, 1]`.
    pub fn default_schedule(levels: usize) -> Vec<usize> {
        (0..levels).rev().map(|l| 1usize << l).collect()
    }
}
