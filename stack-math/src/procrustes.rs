//! Least-squares rigid fit for an accepted pairing (orthogonal Procrustes).
//!
//! Given paired points `p_i` (reference) and `q_i` (target) this finds the
//! rotation `R` and translation `t` minimising
//!
//! ```text
//! Σ ||R·p_i + t − q_i||²
//! ```
//!
//! Both sets are centred on their centroids, the 2x2 cross-covariance
//! `C = Σ p̃_i·q̃_iᵗ` is decomposed as `U·S·Vᵗ`, and `R = (U·Vᵗ)ᵗ`. The
//! transpose appears because the textbook derivation works on row vectors
//! while [`RigidTransform`] acts on column vectors. The translation is then
//! `t = c_q − R·c_p`.
//!
//! When `det(U·Vᵗ) < 0` the unconstrained optimum is a mirror image. The fit
//! flips the singular vector of the smallest singular value so the result
//! is always a proper rotation.

use nalgebra::{Matrix2, Vector2};

use crate::pairing::Pairing;
use crate::point::Locatable2d;
use crate::registrar::RegistrationError;
use crate::transform::RigidTransform;

/// Calculates the geometric centroid (center of mass) of a point set.
///
/// Centroid coordinates, or (0,0) if the point set is empty
fn calculate_centroid(points: &[Vector2<f64>]) -> Vector2<f64> {
    if points.is_empty() {
        return Vector2::zeros();
    }

    let mut centroid = Vector2::zeros();
    for point in points {
        centroid += point;
    }

    centroid / points.len() as f64
}

/// Split a pairing into matched reference and target positions, in pairing order.
fn matched_positions<R1: Locatable2d, R2: Locatable2d>(
    reference: &[R1],
    target: &[R2],
    pairing: &Pairing,
) -> (Vec<Vector2<f64>>, Vec<Vector2<f64>>) {
    let mut ref_matched = Vec::with_capacity(pairing.len());
    let mut tgt_matched = Vec::with_capacity(pairing.len());

    for &(r, t) in pairing.pairs() {
        ref_matched.push(reference[r].position());
        tgt_matched.push(target[t].position());
    }

    (ref_matched, tgt_matched)
}

/// Compute the optimal rigid transform for a pairing.
///
/// # Arguments
/// * `reference` - Reference point set
/// * `target` - Target point set
/// * `pairing` - Accepted correspondence between the two sets
///
/// # Returns
/// Transform mapping reference coordinates onto target coordinates
///
/// # Errors
/// * `RegistrationError::InsufficientPoints` - fewer than two pairs
/// * `RegistrationError::SvdFailed` - SVD did not produce U or Vᵗ
pub fn fit_rigid_transform<R1: Locatable2d, R2: Locatable2d>(
    reference: &[R1],
    target: &[R2],
    pairing: &Pairing,
) -> Result<RigidTransform, RegistrationError> {
    if pairing.len() < 2 {
        return Err(RegistrationError::InsufficientPoints {
            reference: pairing.len(),
            target: pairing.len(),
            required: 2,
        });
    }

    let (ref_matched, tgt_matched) = matched_positions(reference, target, pairing);

    let ref_centroid = calculate_centroid(&ref_matched);
    let tgt_centroid = calculate_centroid(&tgt_matched);

    // Cross-covariance of the centred sets
    let mut c = Matrix2::zeros();
    for (p, q) in ref_matched.iter().zip(&tgt_matched) {
        c += (p - ref_centroid) * (q - tgt_centroid).transpose();
    }

    let svd = c.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let mut v_t = svd.v_t.ok_or(RegistrationError::SvdFailed)?;

    let mut rotation = (u * v_t).transpose();

    if rotation.determinant() < 0.0 {
        let smallest = if svd.singular_values[0] <= svd.singular_values[1] {
            0
        } else {
            1
        };
        let flipped = -v_t.row(smallest);
        v_t.set_row(smallest, &flipped);
        rotation = (u * v_t).transpose();
    }

    let translation = tgt_centroid - rotation * ref_centroid;

    Ok(RigidTransform::from_parts(rotation, translation))
}

/// Root-mean-square distance between `transform(p_i)` and `q_i` over a pairing.
///
/// Returns infinity for an empty pairing.
pub fn rms_residual<R1: Locatable2d, R2: Locatable2d>(
    reference: &[R1],
    target: &[R2],
    pairing: &Pairing,
    transform: &RigidTransform,
) -> f64 {
    if pairing.is_empty() {
        return f64::INFINITY;
    }

    let total: f64 = pairing
        .pairs()
        .iter()
        .map(|&(r, t)| (transform.apply(&reference[r]) - target[t].position()).norm_squared())
        .sum();

    (total / pairing.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix2::rotation_matrix;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn identity_pairing(n: usize) -> Pairing {
        Pairing::from_pairs((0..n).map(|i| (i, i)).collect())
    }

    fn source() -> Vec<Vector2<f64>> {
        // Asymmetric so the fit is unique
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 2.0),
            Vector2::new(-1.5, 0.0),
            Vector2::new(0.0, -1.0),
        ]
    }

    #[test]
    fn test_translation_only() {
        let src = source();
        let translation = Vector2::new(2.0, 3.0);
        let tgt: Vec<_> = src.iter().map(|p| p + translation).collect();

        let t = fit_rigid_transform(&src, &tgt, &identity_pairing(5)).unwrap();

        assert_relative_eq!(t.rotation(), Matrix2::identity(), epsilon = 1e-9);
        assert_relative_eq!(t.translation(), translation, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_and_translation() {
        let src = source();
        let angle = PI / 6.0;
        let r = rotation_matrix(angle);
        let translation = Vector2::new(-4.0, 7.5);
        let tgt: Vec<_> = src.iter().map(|p| r * p + translation).collect();

        let t = fit_rigid_transform(&src, &tgt, &identity_pairing(5)).unwrap();

        assert_relative_eq!(t.rotation(), r, epsilon = 1e-9);
        assert_relative_eq!(t.translation(), translation, epsilon = 1e-9);
        assert_relative_eq!(t.angle(), angle, epsilon = 1e-9);
        assert!(rms_residual(&src, &tgt, &identity_pairing(5), &t) < 1e-9);
    }

    #[test]
    fn test_pairing_order_respected() {
        let src = source();
        let translation = Vector2::new(1.0, 1.0);
        // Target listed in reverse order
        let tgt: Vec<_> = src.iter().rev().map(|p| p + translation).collect();
        let pairing = Pairing::from_pairs((0..5).map(|i| (i, 4 - i)).collect());

        let t = fit_rigid_transform(&src, &tgt, &pairing).unwrap();

        assert_relative_eq!(t.translation(), translation, epsilon = 1e-9);
        assert_relative_eq!(t.angle(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_input_yields_proper_rotation() {
        let src = source();
        let tgt: Vec<_> = src.iter().map(|p| Vector2::new(p.x, -p.y)).collect();

        let t = fit_rigid_transform(&src, &tgt, &identity_pairing(5)).unwrap();

        assert!(t.is_proper());
        assert_relative_eq!(t.rotation().determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_pair_rejected() {
        let src = source();
        let err = fit_rigid_transform(&src, &src, &identity_pairing(1)).unwrap_err();
        assert!(matches!(err, RegistrationError::InsufficientPoints { .. }));
    }
}
