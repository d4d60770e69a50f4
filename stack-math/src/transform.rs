//! Homogeneous rigid transforms between frame coordinate systems.
//!
//! A [`RigidTransform`] maps reference-frame coordinates into a target
//! frame's coordinates:
//!
//! ```text
//! [x']   [r00 r01 tx] [x]
//! [y'] = [r10 r11 ty] [y]
//! [1 ]   [ 0   0   1] [1]
//! ```
//!
//! The bottom row is always `[0, 0, 1]`; constructors only accept a 2x2
//! block and a translation so the invariant cannot be broken.

use std::fmt;
use std::ops::Mul;

use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

use crate::matrix2::{rotation_angle, rotation_matrix};
use crate::point::Locatable2d;

/// Rotation + translation in homogeneous form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix3<f64>,
}

impl RigidTransform {
    /// The identity transform (used for the sequence anchor).
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Build from a 2x2 rotation block and a translation vector.
    pub fn from_parts(rotation: Matrix2<f64>, translation: Vector2<f64>) -> Self {
        let matrix = Matrix3::new(
            rotation[(0, 0)],
            rotation[(0, 1)],
            translation.x,
            rotation[(1, 0)],
            rotation[(1, 1)],
            translation.y,
            0.0,
            0.0,
            1.0,
        );
        Self { matrix }
    }

    /// Counter-clockwise rotation by `angle_rad` followed by translation `(tx, ty)`.
    pub fn from_angle(angle_rad: f64, tx: f64, ty: f64) -> Self {
        Self::from_parts(rotation_matrix(angle_rad), Vector2::new(tx, ty))
    }

    /// Pure translation.
    pub fn translation_only(tx: f64, ty: f64) -> Self {
        Self::from_parts(Matrix2::identity(), Vector2::new(tx, ty))
    }

    /// The full 3x3 homogeneous matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The 2x2 rotation block.
    pub fn rotation(&self) -> Matrix2<f64> {
        self.matrix.fixed_view::<2, 2>(0, 0).into_owned()
    }

    /// The translation column.
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.matrix[(0, 2)], self.matrix[(1, 2)])
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        rotation_angle(&self.rotation())
    }

    /// True when the rotation block has a positive determinant.
    pub fn is_proper(&self) -> bool {
        self.rotation().determinant() > 0.0
    }

    /// `self · other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Closed-form inverse `[Rᵗ | −Rᵗ·t]`.
    ///
    /// Exact for orthogonal rotation blocks, which is all a registrar ever
    /// produces.
    pub fn inverse(&self) -> RigidTransform {
        let r_t = self.rotation().transpose();
        let t = self.translation();
        Self::from_parts(r_t, -(r_t * t))
    }

    /// Map a point through the transform.
    pub fn apply<L: Locatable2d + ?Sized>(&self, point: &L) -> Vector2<f64> {
        let h = self.matrix * Vector3::new(point.x(), point.y(), 1.0);
        Vector2::new(h.x, h.y)
    }

    /// Map a point through the inverse transform.
    pub fn apply_inverse<L: Locatable2d + ?Sized>(&self, point: &L) -> Vector2<f64> {
        let p = Vector2::new(point.x(), point.y()) - self.translation();
        self.rotation().transpose() * p
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

impl<'a> Mul<&'a RigidTransform> for &'a RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: &'a RigidTransform) -> RigidTransform {
        self.compose(rhs)
    }
}

impl fmt::Display for RigidTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        write!(
            f,
            "rot={:.4}° t=({:.3}, {:.3})",
            self.angle().to_degrees(),
            t.x,
            t.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity_leaves_points() {
        let p = RigidTransform::identity().apply(&(3.0, -4.0));
        assert_relative_eq!(p, Vector2::new(3.0, -4.0), epsilon = 1e-12);
    }

    #[test]
    fn test_bottom_row_fixed() {
        let t = RigidTransform::from_angle(0.4, 10.0, -2.0);
        let m = t.matrix();
        assert_eq!((m[(2, 0)], m[(2, 1)], m[(2, 2)]), (0.0, 0.0, 1.0));

        let composed = t * RigidTransform::from_angle(-1.1, 3.0, 3.0);
        let m = composed.matrix();
        assert_relative_eq!(m[(2, 0)], 0.0);
        assert_relative_eq!(m[(2, 1)], 0.0);
        assert_relative_eq!(m[(2, 2)], 1.0);
    }

    #[test]
    fn test_quarter_turn_then_shift() {
        let t = RigidTransform::from_angle(FRAC_PI_2, 1.0, 2.0);
        let p = t.apply(&(1.0, 0.0));
        assert_relative_eq!(p, Vector2::new(1.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(t.angle(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = RigidTransform::from_angle(0.7, -12.5, 40.0);
        let p = Vector2::new(17.0, 23.0);

        let back = t.apply_inverse(&t.apply(&p));
        assert_relative_eq!(back, p, epsilon = 1e-9);

        let product = t * t.inverse();
        assert_relative_eq!(*product.matrix(), Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_apply_inverse_matches_inverse() {
        let t = RigidTransform::from_angle(-0.25, 5.0, 6.0);
        let p = (8.0, 9.0);
        assert_relative_eq!(t.apply_inverse(&p), t.inverse().apply(&p), epsilon = 1e-12);
    }

    #[test]
    fn test_compose_order() {
        let rotate = RigidTransform::from_angle(FRAC_PI_2, 0.0, 0.0);
        let shift = RigidTransform::translation_only(10.0, 0.0);

        // shift first, then rotate
        let p = (rotate * shift).apply(&(0.0, 0.0));
        assert_relative_eq!(p, Vector2::new(0.0, 10.0), epsilon = 1e-12);

        // rotate first, then shift
        let p = (shift * rotate).apply(&(0.0, 0.0));
        assert_relative_eq!(p, Vector2::new(10.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_is_proper() {
        assert!(RigidTransform::from_angle(2.0, 0.0, 0.0).is_proper());
        let mirror = RigidTransform::from_parts(Matrix2::new(1.0, 0.0, 0.0, -1.0), Vector2::zeros());
        assert!(!mirror.is_proper());
    }
}
