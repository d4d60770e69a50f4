//! Output raster that registered frames are painted onto.

use std::path::Path;

use log::debug;
use nalgebra::Vector2;
use ndarray::{Array2, ArrayView2};
use stack_math::RigidTransform;

use super::rect::BoundingRect;
use crate::image_proc::io::{save_u8_image, ImageIoError};

/// Bilinear sample of `frame` at sub-pixel position `(x, y)`.
///
/// Pixel centres sit at integer coordinates. Returns `None` when the
/// position lies outside `[0, width - 1] x [0, height - 1]`.
pub fn sample_bilinear(frame: &ArrayView2<u8>, x: f64, y: f64) -> Option<f64> {
    let (height, width) = frame.dim();
    if width == 0 || height == 0 {
        return None;
    }
    if !(0.0..=(width - 1) as f64).contains(&x) || !(0.0..=(height - 1) as f64).contains(&y) {
        return None;
    }

    let x_low = x.floor() as usize;
    let y_low = y.floor() as usize;
    let x_high = (x_low + 1).min(width - 1);
    let y_high = (y_low + 1).min(height - 1);
    let x_weight = x - x_low as f64;
    let y_weight = y - y_low as f64;

    let q11 = frame[[y_low, x_low]] as f64;
    let q12 = frame[[y_high, x_low]] as f64;
    let q21 = frame[[y_low, x_high]] as f64;
    let q22 = frame[[y_high, x_high]] as f64;

    Some(
        q11 * (1.0 - x_weight) * (1.0 - y_weight)
            + q21 * x_weight * (1.0 - y_weight)
            + q12 * (1.0 - x_weight) * y_weight
            + q22 * x_weight * y_weight,
    )
}

/// A zero-initialised 8-bit raster covering a rectangle of reference coordinates.
///
/// Canvas pixel `(row, col)` corresponds to reference coordinate
/// `(rect.x + col, rect.y + row)`.
#[derive(Debug, Clone)]
pub struct Canvas {
    rect: BoundingRect,
    pixels: Array2<u8>,
    frames_added: usize,
}

impl Canvas {
    /// Allocate a canvas for `rect`, snapped outward to whole pixels.
    pub fn new(rect: BoundingRect) -> Self {
        let rect = rect.snapped();
        let width = rect.w.max(0.0) as usize;
        let height = rect.h.max(0.0) as usize;
        debug!("allocating {}x{} canvas at ({}, {})", width, height, rect.x, rect.y);

        Self {
            rect,
            pixels: Array2::zeros((height, width)),
            frames_added: 0,
        }
    }

    pub fn rect(&self) -> &BoundingRect {
        &self.rect
    }

    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    pub fn into_pixels(self) -> Array2<u8> {
        self.pixels
    }

    pub fn frames_added(&self) -> usize {
        self.frames_added
    }

    /// Paint `frame` onto the canvas.
    ///
    /// `transform` maps reference coordinates into the frame, so each canvas
    /// pixel is mapped forward and the frame is sampled there. Canvas pixels
    /// whose sample falls outside the frame keep their previous value; all
    /// others are overwritten.
    ///
    /// Returns the number of canvas pixels written.
    pub fn add_image(&mut self, frame: &ArrayView2<u8>, transform: &RigidTransform) -> usize {
        let origin = self.rect.origin();
        let mut written = 0;

        for ((row, col), pixel) in self.pixels.indexed_iter_mut() {
            let reference = origin + Vector2::new(col as f64, row as f64);
            let source = transform.apply(&reference);
            if let Some(value) = sample_bilinear(frame, source.x, source.y) {
                *pixel = value.round().clamp(0.0, 255.0) as u8;
                written += 1;
            }
        }

        self.frames_added += 1;
        debug!("frame {} covered {} canvas pixels", self.frames_added, written);
        written
    }

    /// Write the canvas to `path` as an 8-bit grayscale image.
    pub fn flush<P: AsRef<Path>>(self, path: P) -> Result<(), ImageIoError> {
        save_u8_image(&self.pixels, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use tempfile::tempdir;

    fn gradient(width: usize, height: usize) -> Array2<u8> {
        Array2::from_shape_fn((height, width), |(y, x)| (x * 10 + y) as u8)
    }

    #[test]
    fn test_bilinear_midpoints() {
        let frame = array![[0u8, 100], [50, 150]];
        let v = frame.view();
        assert_relative_eq!(sample_bilinear(&v, 0.5, 0.0).unwrap(), 50.0);
        assert_relative_eq!(sample_bilinear(&v, 0.0, 0.5).unwrap(), 25.0);
        assert_relative_eq!(sample_bilinear(&v, 0.5, 0.5).unwrap(), 75.0);
        assert_relative_eq!(sample_bilinear(&v, 1.0, 1.0).unwrap(), 150.0);
        assert_eq!(sample_bilinear(&v, 1.01, 0.0), None);
        assert_eq!(sample_bilinear(&v, -0.01, 0.0), None);
    }

    #[test]
    fn test_new_canvas_is_zeroed() {
        let canvas = Canvas::new(BoundingRect::new(-2.5, 3.2, 10.0, 4.0));
        assert_eq!(*canvas.rect(), BoundingRect::new(-3.0, 3.0, 11.0, 5.0));
        assert_eq!(canvas.pixels().dim(), (5, 11));
        assert!(canvas.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_identity_copies_frame() {
        let frame = gradient(12, 8);
        let mut canvas = Canvas::new(BoundingRect::new(0.0, 0.0, 12.0, 8.0));

        let written = canvas.add_image(&frame.view(), &RigidTransform::identity());

        assert_eq!(written, 96);
        assert_eq!(canvas.pixels(), &frame);
    }

    #[test]
    fn test_translated_frame_lands_offset() {
        let frame = gradient(6, 4);
        // Reference point (2, 1) appears at frame pixel (0, 0)
        let t = RigidTransform::translation_only(-2.0, -1.0);
        let mut canvas = Canvas::new(BoundingRect::new(0.0, 0.0, 10.0, 6.0));

        canvas.add_image(&frame.view(), &t);

        let px = canvas.pixels();
        assert_eq!(px[[1, 3]], frame[[0, 1]]);
        assert_eq!(px[[4, 7]], frame[[3, 5]]);
        // Outside the footprint stays zero
        assert_eq!(px[[0, 0]], 0);
        assert_eq!(px[[5, 9]], 0);
    }

    #[test]
    fn test_last_write_wins_only_in_overlap() {
        let first = Array2::from_elem((4, 4), 10u8);
        let second = Array2::from_elem((4, 4), 200u8);
        let mut canvas = Canvas::new(BoundingRect::new(0.0, 0.0, 6.0, 4.0));

        canvas.add_image(&first.view(), &RigidTransform::identity());
        canvas.add_image(&second.view(), &RigidTransform::translation_only(-2.0, 0.0));

        let px = canvas.pixels();
        assert_eq!(px[[0, 0]], 10);
        assert_eq!(px[[0, 1]], 10);
        assert_eq!(px[[0, 2]], 200);
        assert_eq!(px[[3, 5]], 200);
        assert_eq!(canvas.frames_added(), 2);
    }

    #[test]
    fn test_flush_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stacked.png");
        let mut canvas = Canvas::new(BoundingRect::new(0.0, 0.0, 5.0, 3.0));
        canvas.add_image(&gradient(5, 3).view(), &RigidTransform::identity());

        canvas.flush(&path).unwrap();

        let loaded = crate::image_proc::io::load_gray_image(&path).unwrap();
        assert_eq!(loaded, gradient(5, 3));
    }
}
