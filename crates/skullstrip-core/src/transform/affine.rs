//! Affine transform with a fixed centre.
//!
//! `T(x) = A (x - c) + c + t`
//!
//! where `A` is the 3×3 linear part (rotation, scale, shear), `t` the
//! translation and `c` the centre of rotation and scaling.

use nalgebra::{Matrix3, Rotation3};
use serde::{Deserialize, Serialize};

use super::trait_::Transform;
use crate::spatial::{Point, Vector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    matrix: Matrix3<f64>,
    translation: Vector<3>,
    center: Point<3>,
}

impl AffineTransform {
    pub fn new(matrix: Matrix3<f64>, translation: Vector<3>, center: Point<3>) -> Self {
        Self {
            matrix,
            translation,
            center,
        }
    }

    /// Identity transform about `center`.
    pub fn identity(center: Point<3>) -> Self {
        Self::new(Matrix3::identity(), Vector::zeros(), center)
    }

    /// Rotation (Euler angles in radians, applied X then Y then Z) followed by
    /// anisotropic scaling along the physical axes before rotation.
    ///
    /// `A = Rz · Ry · Rx · diag(scale)`
    pub fn from_euler_scale(
        angles: [f64; 3],
        scale: [f64; 3],
        translation: Vector<3>,
        center: Point<3>,
    ) -> Self {
        let rotation = Rotation3::from_euler_angles(angles[0], angles[1], angles[2]);
        let scaling = Matrix3::from_diagonal(&nalgebra::Vector3::new(scale[0], scale[1], scale[2]));
        Self::new(rotation.matrix() * scaling, translation, center)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn translation(&self) -> &Vector<3> {
        &self.translation
    }

    pub fn center(&self) -> &Point<3> {
        &self.center
    }

    /// Inverse transform about the same centre, if `A` is invertible.
    pub fn inverse(&self) -> Option<Self> {
        let inverse = self.matrix.try_inverse()?;
        let translation = Vector(-(inverse * self.translation.0));
        Some(Self::new(inverse, translation, self.center))
    }

    /// `self ∘ inner`: applies `inner` first. The result keeps `inner`'s centre.
    pub fn compose(&self, inner: &AffineTransform) -> AffineTransform {
        let matrix = self.matrix * inner.matrix;
        let inner_offset = (inner.center + inner.translation) - self.center;
        let moved = self.center + Vector(self.matrix * inner_offset.0) + self.translation;
        Self::new(matrix, moved - inner.center, inner.center)
    }
}

impl Transform<3> for AffineTransform {
    fn transform_point(&self, point: &Point<3>) -> Point<3> {
        let local = *point - self.center;
        self.center + Vector(self.matrix * local.0) + self.translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity_is_noop() {
        let t = AffineTransform::identity(Point::new([3.0, 4.0, 5.0]));
        let p = Point::new([1.0, -2.0, 7.5]);
        assert_eq!(t.transform_point(&p), p);
    }

    #[test]
    fn test_rotation_about_center() {
        let center = Point::new([10.0, 10.0, 0.0]);
        let t = AffineTransform::from_euler_scale(
            [0.0, 0.0, FRAC_PI_2],
            [1.0, 1.0, 1.0],
            Vector::zeros(),
            center,
        );
        let moved = t.transform_point(&Point::new([11.0, 10.0, 0.0]));
        assert!((moved[0] - 10.0).abs() < 1e-12);
        assert!((moved[1] - 11.0).abs() < 1e-12);
        assert_eq!(t.transform_point(&center), center);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = AffineTransform::from_euler_scale(
            [0.1, -0.2, 0.3],
            [1.1, 0.9, 1.05],
            Vector::new([2.0, -3.0, 1.5]),
            Point::new([5.0, 6.0, 7.0]),
        );
        let inverse = t.inverse().expect("invertible");
        let p = Point::new([-4.0, 12.0, 3.0]);
        let back = inverse.transform_point(&t.transform_point(&p));
        for i in 0..3 {
            assert!((back[i] - p[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let inner = AffineTransform::from_euler_scale(
            [0.0, 0.2, 0.0],
            [1.2, 1.0, 0.8],
            Vector::new([1.0, 0.0, -2.0]),
            Point::new([1.0, 2.0, 3.0]),
        );
        let outer = AffineTransform::from_euler_scale(
            [0.3, 0.0, -0.1],
            [1.0, 1.0, 1.0],
            Vector::new([0.0, 4.0, 0.0]),
            Point::new([-5.0, 0.0, 2.0]),
        );
        let composed = outer.compose(&inner);
        let p = Point::new([7.0, -1.0, 0.5]);
        let expected = outer.transform_point(&inner.transform_point(&p));
        let actual = composed.transform_point(&p);
        for i in 0..3 {
            assert!((actual[i] - expected[i]).abs() < 1e-9);
        }
    }
}
