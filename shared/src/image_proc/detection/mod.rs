//! Star detection on 8-bit frames.
//!
//! - **thresholding**: histogram threshold, dilation and connected component analysis
//! - **extract**: star list extraction built on the thresholding primitives

pub mod extract;
pub mod thresholding;

pub use extract::{extract_stars, ExtractError, ExtractionConfig, Star};
pub use thresholding::{
    apply_threshold, component_sizes, connected_components, dilate, histogram_threshold,
};
