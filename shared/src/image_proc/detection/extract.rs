//! Star extraction from 8-bit frames.
//!
//! The frame is thresholded at a level adapted to its own histogram, the
//! mask is dilated so fragments of one star merge, and each remaining
//! connected region yields one star at the intensity-weighted centroid of
//! the original pixels under the region.

use log::debug;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use stack_math::Locatable2d;
use thiserror::Error;

use super::thresholding::{
    apply_threshold, component_sizes, connected_components, dilate, histogram_threshold,
};

/// A detected star in pixel coordinates (x = column, y = row).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    /// Sum of pixel values under the star's region.
    pub flux: f64,
}

impl Locatable2d for Star {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

/// Reasons a frame yields no usable star list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("extraction failed: image too bright")]
    TooBright,

    #[error("extraction failed: too many stars ({found} > {max})")]
    TooManyStars { found: usize, max: usize },

    #[error("extraction failed: too few stars ({found} < {min})")]
    TooFewStars { found: usize, min: usize },
}

/// Tunables for star extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Fraction of the frame allowed above the base threshold.
    /// Default: 0.025
    pub threshold_fraction: f64,

    /// Added to the histogram level before binarising.
    /// Default: 2
    pub threshold_bias: u8,

    /// Side of the square dilation window in pixels.
    /// Default: 9
    pub dilation_size: usize,

    /// Default: 8
    pub min_stars: usize,

    /// Default: 50
    pub max_stars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.025,
            threshold_bias: 2,
            dilation_size: 9,
            min_stars: 8,
            max_stars: 50,
        }
    }
}

/// Extract star positions from a grayscale frame.
///
/// Stars are returned in raster-scan order of their regions' first pixel.
///
/// # Errors
/// * `ExtractError::TooBright` - no threshold level leaves a dark enough frame
/// * `ExtractError::TooManyStars` / `TooFewStars` - region count out of range
pub fn extract_stars(
    image: &ArrayView2<u8>,
    config: &ExtractionConfig,
) -> Result<Vec<Star>, ExtractError> {
    let base = histogram_threshold(image, config.threshold_fraction)
        .ok_or(ExtractError::TooBright)?;
    let threshold = base.saturating_add(config.threshold_bias);

    let mask = apply_threshold(image, threshold);
    let dilated = dilate(&mask.view(), config.dilation_size);
    let labels = connected_components(&dilated.view());
    let sizes = component_sizes(&labels.view());

    // Moments per label: (m00, m10, m01)
    let mut moments = vec![(0.0f64, 0.0f64, 0.0f64); sizes.len()];
    for ((row, col), &label) in labels.indexed_iter() {
        if label == 0 || sizes[label - 1] < 2 {
            continue;
        }
        let value = image[[row, col]] as f64;
        let m = &mut moments[label - 1];
        m.0 += value;
        m.1 += value * col as f64;
        m.2 += value * row as f64;
    }

    let regions = sizes.iter().filter(|&&size| size > 1).count();
    debug!(
        "threshold {} (base {}), {} regions of which {} kept",
        threshold,
        base,
        sizes.len(),
        regions
    );

    if regions > config.max_stars {
        return Err(ExtractError::TooManyStars {
            found: regions,
            max: config.max_stars,
        });
    }
    if regions < config.min_stars {
        return Err(ExtractError::TooFewStars {
            found: regions,
            min: config.min_stars,
        });
    }

    Ok(sizes
        .iter()
        .zip(&moments)
        .filter(|(size, m)| **size > 1 && m.0 > 0.0)
        .map(|(_, &(m00, m10, m01))| Star {
            x: m10 / m00,
            y: m01 / m00,
            flux: m00,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_helpers::{flat_frame, random_star_field, render_star_field};

    fn small_config() -> ExtractionConfig {
        ExtractionConfig {
            min_stars: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_star_centroid() {
        let truth = Vector2::new(20.3, 14.6);
        let image = render_star_field(&[truth], 40, 30, 1.2, 180.0);

        let stars = extract_stars(&image.view(), &small_config()).unwrap();

        assert_eq!(stars.len(), 1);
        assert_relative_eq!(stars[0].x, truth.x, epsilon = 0.05);
        assert_relative_eq!(stars[0].y, truth.y, epsilon = 0.05);
        assert!(stars[0].flux > 0.0);
    }

    #[test]
    fn test_star_field_recovered() {
        let mut rng = StdRng::seed_from_u64(21);
        let truth = random_star_field(&mut rng, 12, 280.0, 180.0, 30.0).unwrap();
        // Keep stars away from the border so no blob is clipped
        let truth: Vec<_> = truth
            .into_iter()
            .map(|p| Vector2::new(p.x + 10.0, p.y + 10.0))
            .collect();
        let image = render_star_field(&truth, 300, 200, 1.5, 200.0);

        let stars = extract_stars(&image.view(), &ExtractionConfig::default()).unwrap();

        assert_eq!(stars.len(), truth.len());
        for t in &truth {
            let nearest = stars
                .iter()
                .map(|s| s.distance_to(t))
                .fold(f64::INFINITY, f64::min);
            assert!(nearest < 0.1, "star at {t:?} missed by {nearest}");
        }
    }

    #[test]
    fn test_too_few_stars() {
        let image = render_star_field(&[Vector2::new(10.0, 10.0)], 40, 40, 1.0, 150.0);
        let err = extract_stars(&image.view(), &ExtractionConfig::default()).unwrap_err();
        assert_eq!(err, ExtractError::TooFewStars { found: 1, min: 8 });
    }

    #[test]
    fn test_too_many_stars() {
        let mut image = Array2::<u8>::zeros((200, 200));
        // 6x6 grid of isolated 2-pixel blobs, spaced wider than the dilation
        for gy in 0..6 {
            for gx in 0..6 {
                image[[10 + gy * 30, 10 + gx * 30]] = 200;
                image[[10 + gy * 30, 11 + gx * 30]] = 200;
            }
        }
        let config = ExtractionConfig {
            max_stars: 20,
            ..Default::default()
        };

        let err = extract_stars(&image.view(), &config).unwrap_err();
        assert_eq!(err, ExtractError::TooManyStars { found: 36, max: 20 });
    }

    #[test]
    fn test_too_bright() {
        let config = ExtractionConfig {
            threshold_fraction: 0.0,
            ..Default::default()
        };
        let err = extract_stars(&flat_frame(16, 16, 255).view(), &config).unwrap_err();
        assert_eq!(err, ExtractError::TooBright);
    }
}
