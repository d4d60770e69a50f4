//! stack-math - Point-set registration for star-field stacking
//!
//! This crate provides the geometry used to align frames of the same star
//! field taken at different pointings:
//!
//! - **Transform** - homogeneous 2D rigid transforms (rotation + translation)
//! - **Pairing** - RANSAC search for distance-consistent star correspondences
//! - **Procrustes** - least-squares rigid fit of an accepted pairing via SVD
//! - **Registrar** - pairwise registration combining the two
//! - **Sequence** - registration of a whole frame sequence against its first frame
//!
//! # Example
//!
//! ```text
//! use stack_math::{PointSetRegistrar, RegistrationConfig, RigidTransform};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let reference = vec![(10.0, 12.0), (82.0, 20.0), (47.0, 55.0), (18.0, 78.0)];
//! let truth = RigidTransform::from_angle(0.1, 3.0, 4.0);
//! let target: Vec<_> = reference.iter().map(|p| truth.apply(p)).collect();
//!
//! let registrar = PointSetRegistrar::new(RegistrationConfig::default());
//! let mut rng = StdRng::seed_from_u64(0);
//! let registration = registrar.register(&reference, &target, &mut rng)?;
//! ```

pub mod matrix2;
pub mod pairing;
pub mod point;
pub mod procrustes;
pub mod registrar;
pub mod sequence;
pub mod transform;


// Re-export commonly used types
pub use matrix2::{is_reflection, orthonormality_error, rotation_angle, rotation_matrix};
pub use pairing::{find_pairing, Pairing};
pub use point::Locatable2d;
pub use procrustes::{fit_rigid_transform, rms_residual};
pub use registrar::{PointSetRegistrar, Registration, RegistrationConfig, RegistrationError};
pub use sequence::{Outcomes, RegisteredFrame, RegistrationOutcome, SequenceRegistrar};
pub use transform::RigidTransform;
