//! Axis-aligned rectangles in reference-frame coordinates.

use std::fmt;

use nalgebra::Vector2;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use stack_math::RigidTransform;

use super::CompositeError;

/// Rectangle with origin `(x, y)` and extent `(w, h)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest rectangle containing every point, `None` for no points.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Vector2<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let start = Self::new(first.x, first.y, 0.0, 0.0);
        Some(start.expand(iter))
    }

    /// Grow the rectangle until it contains every point.
    pub fn expand<'a, I>(&self, points: I) -> Self
    where
        I: IntoIterator<Item = &'a Vector2<f64>>,
    {
        let (mut min_x, mut min_y) = (self.x, self.y);
        let (mut max_x, mut max_y) = (self.x + self.w, self.y + self.h);

        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn origin(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Vector2<f64>; 4] {
        [
            Vector2::new(self.x, self.y),
            Vector2::new(self.x + self.w, self.y),
            Vector2::new(self.x, self.y + self.h),
            Vector2::new(self.x + self.w, self.y + self.h),
        ]
    }

    /// Inclusive containment test with an absolute tolerance.
    pub fn contains(&self, point: &Vector2<f64>, tolerance: f64) -> bool {
        point.x >= self.x - tolerance
            && point.y >= self.y - tolerance
            && point.x <= self.x + self.w + tolerance
            && point.y <= self.y + self.h + tolerance
    }

    /// Overlap of two rectangles, `None` when they do not overlap with positive area.
    pub fn intersect(&self, other: &BoundingRect) -> Option<BoundingRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Expand outward to whole-pixel boundaries.
    pub fn snapped(&self) -> BoundingRect {
        let x0 = self.x.floor();
        let y0 = self.y.floor();
        let x1 = (self.x + self.w).ceil();
        let y1 = (self.y + self.h).ceil();
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

impl fmt::Display for BoundingRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1},{:.1} {:.1}x{:.1}",
            self.x, self.y, self.w, self.h
        )
    }
}

/// The four pixel-space corners of a frame, pulled back into reference coordinates.
pub fn frame_corners_in_reference(
    frame: &ArrayView2<u8>,
    transform: &RigidTransform,
) -> [Vector2<f64>; 4] {
    let (height, width) = frame.dim();
    let pixel_rect = BoundingRect::new(0.0, 0.0, width as f64, height as f64);
    pixel_rect.corners().map(|c| transform.apply_inverse(&c))
}

/// Rectangle in reference coordinates bounding every frame's footprint.
///
/// Each transform maps reference coordinates to its frame's coordinates, so
/// frame corners go through the inverse.
///
/// # Errors
/// * `CompositeError::Empty` - no frames were supplied
pub fn bounding_rect<'a, I>(frames_and_transforms: I) -> Result<BoundingRect, CompositeError>
where
    I: IntoIterator<Item = (ArrayView2<'a, u8>, &'a RigidTransform)>,
{
    let corners: Vec<Vector2<f64>> = frames_and_transforms
        .into_iter()
        .flat_map(|(frame, transform)| frame_corners_in_reference(&frame, transform))
        .collect();

    BoundingRect::from_points(&corners).ok_or(CompositeError::Empty)
}
