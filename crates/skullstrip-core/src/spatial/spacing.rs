//! Spacing between adjacent voxels.

use super::Vector;

/// Physical distance between adjacent voxels along each axis.
///
/// Type alias to [`Vector`] for semantic clarity.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Create uniform spacing (same value for all dimensions).
    pub fn uniform(value: f64) -> Self {
        Vector::repeat(value)
    }

    /// All components finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self[i].is_finite() && self[i] > 0.0)
    }

    /// Get the minimum spacing value.
    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, f64::min)
    }

    /// Physical volume of one voxel.
    pub fn voxel_volume(&self) -> f64 {
        (0..D).map(|i| self[i]).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Spacing3 = Spacing<3>;

    #[test]
    fn test_spacing_uniform() {
        let s = Spacing3::uniform(1.5);
        assert_eq!(s, Spacing3::new([1.5, 1.5, 1.5]));
    }

    #[test]
    fn test_spacing_validity() {
        assert!(Spacing3::new([1.0, 0.5, 2.0]).is_valid());
        assert!(!Spacing3::new([1.0, 0.0, 2.0]).is_valid());
        assert!(!Spacing3::new([1.0, f64::NAN, 2.0]).is_valid());
    }

    #[test]
    fn test_spacing_min_and_volume() {
        let s = Spacing3::new([1.0, 2.0, 3.0]);
        assert_eq!(s.min_spacing(), 1.0);
        assert_eq!(s.voxel_volume(), 6.0);
    }
}
