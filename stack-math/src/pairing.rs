//! Random-sample-consensus search for star correspondences.
//!
//! A *pairing* is a partial one-to-one mapping between two point sets,
//! stored as `(reference_idx, target_idx)` pairs. Because a rigid motion
//! preserves distances, every two pairs `(p1, q1)`, `(p2, q2)` of a valid
//! pairing satisfy
//!
//! ```text
//! |dist(p1, p2) - dist(q1, q2)| <= max_distance
//! ```
//!
//! The test is invariant to rotation and translation, so no initial
//! alignment guess is required.
//!
//! # Search
//!
//! 1. Draw two reference and two target points to form a two-pair model.
//! 2. Reject the model unless the two pairs are distance-consistent.
//! 3. Greedily grow the model: scan unused reference points in order and
//!    pair each with the first unused target point consistent with every
//!    pair already accepted.
//! 4. Accept once the pairing holds at least `min_paired` pairs and a rigid
//!    fit to it leaves an RMS residual of at most `max_distance`.
//!
//! The distance test alone cannot tell a motion from its mirror image, and
//! a mutual swap `(a, b), (b, a)` passes it whenever the motion is small.
//! The residual check in step 4 rejects both.

use log::{debug, trace};
use rand::seq::index;
use rand::Rng;

use crate::point::Locatable2d;
use crate::procrustes::{fit_rigid_transform, rms_residual};
use crate::registrar::{RegistrationConfig, RegistrationError};

/// Ordered correspondence between a reference and a target point set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    pairs: Vec<(usize, usize)>,
}

impl Pairing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pairing from explicit index pairs.
    ///
    /// No consistency check is performed; use [`Pairing::max_distance_error`]
    /// to validate.
    pub fn from_pairs(pairs: Vec<(usize, usize)>) -> Self {
        Self { pairs }
    }

    /// Index pairs in insertion order.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn uses_reference(&self, idx: usize) -> bool {
        self.pairs.iter().any(|&(r, _)| r == idx)
    }

    pub fn uses_target(&self, idx: usize) -> bool {
        self.pairs.iter().any(|&(_, t)| t == idx)
    }

    /// Check whether `(reference_idx, target_idx)` preserves distances to
    /// every pair already in the pairing.
    pub fn fits<R1: Locatable2d, R2: Locatable2d>(
        &self,
        reference: &[R1],
        target: &[R2],
        pair: (usize, usize),
        max_distance: f64,
    ) -> bool {
        let (s1, s2) = (&reference[pair.0], &target[pair.1]);
        self.pairs.iter().all(|&(r, t)| {
            (s1.distance_to(&reference[r]) - s2.distance_to(&target[t])).abs() <= max_distance
        })
    }

    /// Append a pair without checking it.
    pub fn push(&mut self, pair: (usize, usize)) {
        self.pairs.push(pair);
    }

    /// Largest `|dist(p1, p2) - dist(q1, q2)|` over all pairs of pairs.
    ///
    /// Returns 0.0 for pairings with fewer than two pairs.
    pub fn max_distance_error<R1: Locatable2d, R2: Locatable2d>(
        &self,
        reference: &[R1],
        target: &[R2],
    ) -> f64 {
        let mut worst: f64 = 0.0;
        for (i, &(r1, t1)) in self.pairs.iter().enumerate() {
            for &(r2, t2) in &self.pairs[i + 1..] {
                let d_ref = reference[r1].distance_to(&reference[r2]);
                let d_tgt = target[t1].distance_to(&target[t2]);
                worst = worst.max((d_ref - d_tgt).abs());
            }
        }
        worst
    }

    /// Extend the pairing greedily over every unused combination.
    fn grow<R1: Locatable2d, R2: Locatable2d>(
        &mut self,
        reference: &[R1],
        target: &[R2],
        max_distance: f64,
    ) {
        for r in 0..reference.len() {
            if self.uses_reference(r) {
                continue;
            }
            for t in 0..target.len() {
                if self.uses_target(t) {
                    continue;
                }
                if self.fits(reference, target, (r, t), max_distance) {
                    self.pairs.push((r, t));
                    break;
                }
            }
        }
    }
}

/// Draw a random two-pair model.
fn pick_random_model<R: Rng + ?Sized>(rng: &mut R, n_reference: usize, n_target: usize) -> Pairing {
    let r = index::sample(rng, n_reference, 2);
    let t = index::sample(rng, n_target, 2);
    Pairing::from_pairs(vec![(r.index(0), t.index(0)), (r.index(1), t.index(1))])
}

/// Search for a distance-consistent pairing of at least `config.min_paired`
/// pairs that a rigid motion explains to within `config.max_distance` RMS.
///
/// Returns the accepted pairing and the number of iterations consumed.
///
/// # Errors
/// * `RegistrationError::InsufficientPoints` - either set is smaller than `min_paired`
/// * `RegistrationError::NoConsensus` - the iteration budget ran out
pub fn find_pairing<R1, R2, G>(
    reference: &[R1],
    target: &[R2],
    config: &RegistrationConfig,
    rng: &mut G,
) -> Result<(Pairing, usize), RegistrationError>
where
    R1: Locatable2d,
    R2: Locatable2d,
    G: Rng + ?Sized,
{
    let required = config.min_paired.max(2);
    if reference.len() < required || target.len() < required {
        return Err(RegistrationError::InsufficientPoints {
            reference: reference.len(),
            target: target.len(),
            required,
        });
    }

    for iteration in 0..config.max_iters {
        let model = pick_random_model(rng, reference.len(), target.len());
        let (first, second) = (model.pairs[0], model.pairs[1]);

        let seed = Pairing::from_pairs(vec![first]);
        if !seed.fits(reference, target, second, config.max_distance) {
            continue;
        }

        let mut pairing = model;
        pairing.grow(reference, target, config.max_distance);
        trace!("iteration {iteration}: grew pairing to {} pairs", pairing.len());

        if pairing.len() < required {
            continue;
        }

        let residual = fit_rigid_transform(reference, target, &pairing)
            .map(|transform| rms_residual(reference, target, &pairing, &transform))
            .unwrap_or(f64::INFINITY);
        if residual > config.max_distance {
            trace!(
                "iteration {iteration}: rejected {} pairs, rms residual {residual:.2} px",
                pairing.len()
            );
            continue;
        }

        debug!(
            "accepted pairing of {} pairs after {} iterations (rms {residual:.3} px)",
            pairing.len(),
            iteration + 1
        );
        return Ok((pairing, iteration + 1));
    }

    Err(RegistrationError::NoConsensus {
        iterations: config.max_iters,
    })
}
