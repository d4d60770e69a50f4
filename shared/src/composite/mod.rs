//! Compositing of registered frames into stacked output rasters.
//!
//! Every frame carries a transform mapping reference (anchor) coordinates
//! into its own pixel coordinates. A group of frames is composited by:
//!
//! 1. [`bounding_rect`] - pulling each frame's corners back into reference
//!    coordinates and taking the union,
//! 2. [`Canvas::new`] - allocating a raster for that rectangle,
//! 3. [`Canvas::add_image`] - painting frames in order; later frames
//!    overwrite earlier ones where they overlap.
//!
//! Frames are split into groups by time gap with [`group_by_interval`].

pub mod canvas;
pub mod grouping;
pub mod rect;

use thiserror::Error;

pub use canvas::{sample_bilinear, Canvas};
pub use grouping::{apply_crop, group_by_interval, DEFAULT_MAX_FRAME_INTERVAL_SECS};
pub use rect::{bounding_rect, frame_corners_in_reference, BoundingRect};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("cannot composite an empty set of frames")]
    Empty,
}
