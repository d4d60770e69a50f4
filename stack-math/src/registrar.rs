//! Pairwise point-set registration (RANSAC search + Procrustes fit).

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pairing::{find_pairing, Pairing};
use crate::point::Locatable2d;
use crate::procrustes::{fit_rigid_transform, rms_residual};
use crate::transform::RigidTransform;

/// Reasons a registration attempt fails.
///
/// Every variant means "registration failed"; the payload only says why.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("registration failed: need {required} points, got reference={reference} target={target}")]
    InsufficientPoints {
        reference: usize,
        target: usize,
        required: usize,
    },

    #[error("registration failed: no consistent pairing within {iterations} iterations")]
    NoConsensus { iterations: usize },

    #[error("registration failed: SVD decomposition failed to produce U or V^T matrices")]
    SvdFailed,

    #[error("registration failed: all {attempts} candidate anchors rejected the frame")]
    AnchorsExhausted { attempts: usize },
}

/// Tunables for the registration search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Maximum number of RANSAC iterations before giving up.
    /// Default: 100_000
    pub max_iters: usize,

    /// Maximum permissible difference between paired distances, in pixels.
    /// Default: 3.0
    pub max_distance: f64,

    /// Number of pairs an accepted pairing must reach.
    /// Default: 4
    pub min_paired: usize,

    /// Recently registered frames tried as anchors after the sequence anchor.
    /// Default: 3
    pub retries: usize,

    /// Seed for the sampling RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_iters: 100_000,
            max_distance: 3.0,
            min_paired: 4,
            retries: 3,
            seed: None,
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iters(mut self, iterations: usize) -> Self {
        self.max_iters = iterations;
        self
    }

    pub fn with_max_distance(mut self, pixels: f64) -> Self {
        self.max_distance = pixels;
        self
    }

    pub fn with_min_paired(mut self, count: usize) -> Self {
        self.min_paired = count;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A successful pairwise registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Maps reference coordinates to target coordinates.
    pub transform: RigidTransform,

    /// The correspondence the transform was fitted to.
    pub pairing: Pairing,

    /// RANSAC iterations consumed.
    pub iterations: usize,

    /// RMS distance between mapped reference points and their targets.
    pub rms_residual: f64,
}

/// Registers one point set against another.
#[derive(Debug, Clone, Default)]
pub struct PointSetRegistrar {
    config: RegistrationConfig,
}

impl PointSetRegistrar {
    pub fn new(config: RegistrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Find a correspondence between `reference` and `target` and fit the
    /// rigid transform mapping reference coordinates onto target coordinates.
    ///
    /// # Errors
    /// Any [`RegistrationError`]; a partial or degenerate transform is never
    /// returned.
    pub fn register<R1, R2, G>(
        &self,
        reference: &[R1],
        target: &[R2],
        rng: &mut G,
    ) -> Result<Registration, RegistrationError>
    where
        R1: Locatable2d,
        R2: Locatable2d,
        G: Rng + ?Sized,
    {
        let (pairing, iterations) = find_pairing(reference, target, &self.config, rng)?;
        let transform = fit_rigid_transform(reference, target, &pairing)?;
        let rms_residual = rms_residual(reference, target, &pairing, &transform);

        debug!(
            "registered {} pairs in {} iterations: {} (rms {:.3} px)",
            pairing.len(),
            iterations,
            transform,
            rms_residual
        );

        Ok(Registration {
            transform,
            pairing,
            iterations,
            rms_residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Vector2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn registrar() -> PointSetRegistrar {
        PointSetRegistrar::new(RegistrationConfig::default().with_max_iters(20_000))
    }

    fn stars() -> Vec<(f64, f64)> {
        vec![
            (101.0, 37.0),
            (240.5, 88.0),
            (33.0, 210.0),
            (180.0, 260.0),
            (305.0, 190.0),
            (150.0, 140.0),
            (60.0, 300.0),
            (280.0, 20.0),
        ]
    }

    #[test]
    fn test_self_registration_is_identity() {
        let s = stars();
        let mut rng = StdRng::seed_from_u64(42);

        let reg = registrar().register(&s, &s, &mut rng).unwrap();

        assert_relative_eq!(reg.transform.rotation(), Matrix2::identity(), epsilon = 1e-9);
        assert_relative_eq!(reg.transform.translation(), Vector2::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn test_known_transform_recovered() {
        let s = stars();
        let truth = RigidTransform::from_angle(0.2, 15.0, -8.0);
        let moved: Vec<_> = s.iter().map(|p| truth.apply(p)).collect();
        let mut rng = StdRng::seed_from_u64(5);

        let reg = registrar().register(&s, &moved, &mut rng).unwrap();

        assert_relative_eq!(reg.transform.angle(), 0.2, epsilon = 1e-9);
        assert_relative_eq!(
            reg.transform.translation(),
            Vector2::new(15.0, -8.0),
            epsilon = 1e-7
        );
        assert!(reg.rms_residual < 1e-7);
    }

    #[test]
    fn test_config_builders() {
        let cfg = RegistrationConfig::new()
            .with_max_iters(10)
            .with_max_distance(1.5)
            .with_min_paired(5)
            .with_retries(2)
            .with_seed(9);
        assert_eq!(cfg.max_iters, 10);
        assert_relative_eq!(cfg.max_distance, 1.5);
        assert_eq!(cfg.min_paired, 5);
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.seed, Some(9));
    }

    #[test]
    fn test_error_messages_mention_failure() {
        let err = RegistrationError::NoConsensus { iterations: 12 };
        assert_eq!(
            err.to_string(),
            "registration failed: no consistent pairing within 12 iterations"
        );
    }
}
