//! Trilinear interpolation.

use ndarray::Array3;

use super::trait_::Interpolator;

/// Indices this close outside the buffer are clamped onto its edge.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Trilinear interpolator.
///
/// Valid for continuous indices inside `[0, n - 1]` along every axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl Interpolator for LinearInterpolator {
    fn evaluate(&self, data: &Array3<f32>, index: [f64; 3]) -> Option<f32> {
        let (nx, ny, nz) = data.dim();
        let dims = [nx, ny, nz];

        let mut base = [0usize; 3];
        let mut frac = [0f64; 3];
        for axis in 0..3 {
            if dims[axis] == 0 {
                return None;
            }
            let upper = (dims[axis] - 1) as f64;
            let x = index[axis];
            if !(x >= -EDGE_TOLERANCE && x <= upper + EDGE_TOLERANCE) {
                return None;
            }
            let x = x.clamp(0.0, upper);
            let floor = x.floor();
            let b = floor as usize;
            if b >= dims[axis] - 1 {
                base[axis] = dims[axis] - 1;
                frac[axis] = 0.0;
            } else {
                base[axis] = b;
                frac[axis] = x - floor;
            }
        }

        let mut value = 0.0f64;
        for corner in 0..8usize {
            let mut weight = 1.0;
            let mut idx = base;
            for axis in 0..3 {
                if (corner >> axis) & 1 == 1 {
                    weight *= frac[axis];
                    idx[axis] += 1;
                } else {
                    weight *= 1.0 - frac[axis];
                }
            }
            // Zero-weight corners may sit one past the edge.
            if weight == 0.0 {
                continue;
            }
            value += weight * data[(idx[0], idx[1], idx[2])] as f64;
        }
        Some(value as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((4, 4, 4), |(i, j, k)| (i + 2 * j + 4 * k) as f32)
    }

    #[test]
    fn test_linear_exact_at_grid_points() {
        let data = ramp();
        let v = LinearInterpolator.evaluate(&data, [1.0, 2.0, 3.0]);
        assert_eq!(v, Some(17.0));
    }

    #[test]
    fn test_linear_reproduces_linear_field() {
        let data = ramp();
        let v = LinearInterpolator
            .evaluate(&data, [0.5, 1.25, 2.75])
            .expect("inside");
        assert!((v - (0.5 + 2.5 + 11.0)).abs() < 1e-5);
    }

    #[test]
    fn test_linear_upper_edge_and_outside() {
        let data = ramp();
        assert_eq!(LinearInterpolator.evaluate(&data, [3.0, 3.0, 3.0]), Some(21.0));
        assert_eq!(LinearInterpolator.evaluate(&data, [3.01, 0.0, 0.0]), None);
        assert_eq!(LinearInterpolator.evaluate(&data, [-0.5, 0.0, 0.0]), None);
    }
}
