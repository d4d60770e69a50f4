//! 2x2 rotation-block utilities using nalgebra
//!
//! Helpers for building and inspecting the rotation part of a rigid
//! transform, including detection of reflections produced by a
//! least-squares fit.

use nalgebra::Matrix2;

/// Create a 2x2 rotation matrix
///
/// # Arguments
/// * `angle_rad` - Rotation angle in radians (counter-clockwise)
///
/// # Returns
/// Rotation matrix
pub fn rotation_matrix(angle_rad: f64) -> Matrix2<f64> {
    let c = angle_rad.cos();
    let s = angle_rad.sin();
    Matrix2::new(c, -s, s, c)
}

/// Recover the rotation angle (radians, in (-π, π]) of a rotation block.
pub fn rotation_angle(rotation: &Matrix2<f64>) -> f64 {
    rotation[(1, 0)].atan2(rotation[(0, 0)])
}

/// Frobenius norm of `Rᵗ·R − I`.
///
/// Zero for an exactly orthogonal matrix; grows with scale or shear
/// contamination of the block.
pub fn orthonormality_error(rotation: &Matrix2<f64>) -> f64 {
    (rotation.transpose() * rotation - Matrix2::identity()).norm()
}

/// True when the block is orthogonal with determinant -1 (a mirror image).
pub fn is_reflection(rotation: &Matrix2<f64>) -> bool {
    rotation.determinant() < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use std::f64::consts::PI;

    #[test]
    fn test_rotation_90_degrees() {
        let matrix = rotation_matrix(PI / 2.0);
        let input = Vector2::new(1.0, 0.0);

        let output = matrix * input;

        assert_relative_eq!(output.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(output.y, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rotation_angle_roundtrip() {
        for &angle in &[0.0, 0.1, -0.7, 2.5, -3.0] {
            let recovered = rotation_angle(&rotation_matrix(angle));
            assert_relative_eq!(recovered, angle, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let r = rotation_matrix(0.3);
        assert!(orthonormality_error(&r) < 1e-12);
        assert!(!is_reflection(&r));
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scaled_block_not_orthonormal() {
        let r = rotation_matrix(0.3) * 1.1;
        assert!(orthonormality_error(&r) > 0.1);
    }

    #[test]
    fn test_mirror_detected() {
        let mirror = Matrix2::new(1.0, 0.0, 0.0, -1.0);
        assert!(is_reflection(&mirror));
        assert!(orthonormality_error(&mirror) < 1e-12);
    }
}
