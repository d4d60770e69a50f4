//! Test helpers for the stacking workspace
//!
//! Synthetic star fields, rigid motions and rendered 8-bit rasters used by
//! the registration, extraction and compositing tests.

use nalgebra::Vector2;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("could only place {placed} of {requested} stars with the requested separation")]
    FieldTooDense { requested: usize, placed: usize },

    #[error("invalid noise sigma: {0}")]
    InvalidSigma(f64),
}

/// Attempts per requested star before giving up on the separation constraint.
const PLACEMENT_ATTEMPTS: usize = 1000;

/// Scatter `count` stars uniformly over a `width` x `height` field.
///
/// Every pair of stars is at least `min_separation` pixels apart, which keeps
/// rendered blobs from merging and keeps pairwise distances distinct enough
/// for registration tests.
///
/// # Returns
/// * Ok(Vec<Vector2<f64>>) - Star positions in placement order
/// * Err(TestHelperError) - If the field cannot hold that many separated stars
pub fn random_star_field<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    width: f64,
    height: f64,
    min_separation: f64,
) -> Result<Vec<Vector2<f64>>, TestHelperError> {
    let mut stars: Vec<Vector2<f64>> = Vec::with_capacity(count);

    for _ in 0..count * PLACEMENT_ATTEMPTS {
        if stars.len() == count {
            break;
        }
        let candidate = Vector2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
        if stars
            .iter()
            .all(|s| (s - candidate).norm() >= min_separation)
        {
            stars.push(candidate);
        }
    }

    if stars.len() < count {
        return Err(TestHelperError::FieldTooDense {
            requested: count,
            placed: stars.len(),
        });
    }
    Ok(stars)
}

/// Rotate every point counter-clockwise about the origin by `angle_rad`, then
/// shift by `(tx, ty)`.
pub fn rigid_motion(points: &[Vector2<f64>], angle_rad: f64, tx: f64, ty: f64) -> Vec<Vector2<f64>> {
    let (s, c) = angle_rad.sin_cos();
    points
        .iter()
        .map(|p| Vector2::new(c * p.x - s * p.y + tx, s * p.x + c * p.y + ty))
        .collect()
}

/// Add independent Gaussian noise with standard deviation `sigma` to each coordinate.
pub fn jitter<R: Rng + ?Sized>(
    points: &[Vector2<f64>],
    sigma: f64,
    rng: &mut R,
) -> Result<Vec<Vector2<f64>>, TestHelperError> {
    let noise = Normal::new(0.0, sigma).map_err(|_| TestHelperError::InvalidSigma(sigma))?;
    Ok(points
        .iter()
        .map(|p| Vector2::new(p.x + noise.sample(rng), p.y + noise.sample(rng)))
        .collect())
}

/// Render stars as Gaussian blobs on a dark `height` x `width` raster.
///
/// Each star contributes `peak * exp(-r² / 2σ²)` within a 4σ radius; the
/// sum is clamped to 255. Stars outside the raster are simply clipped.
pub fn render_star_field(
    stars: &[Vector2<f64>],
    width: usize,
    height: usize,
    sigma: f64,
    peak: f64,
) -> Array2<u8> {
    let mut acc = Array2::<f64>::zeros((height, width));
    let radius = (4.0 * sigma).ceil() as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    for star in stars {
        let cx = star.x.round() as isize;
        let cy = star.y.round() as isize;
        for y in (cy - radius)..=(cy + radius) {
            for x in (cx - radius)..=(cx + radius) {
                if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
                    continue;
                }
                let dx = x as f64 - star.x;
                let dy = y as f64 - star.y;
                acc[[y as usize, x as usize]] += peak * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
            }
        }
    }

    acc.mapv(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// A uniform raster, handy for brightness-rejection tests.
pub fn flat_frame(width: usize, height: usize, value: u8) -> Array2<u8> {
    Array2::from_elem((height, width), value)
}
