//! Image processing for star-field frames.
//!
//! # Module Organization
//!
//! - **detection**: histogram thresholding, connected components and star extraction
//! - **image**: conversions between ndarray and image crate types
//! - **io**: loading frames and writing stacked output

pub mod detection;
pub mod image;
pub mod io;

// Re-export key functionality for easier access
pub use detection::{extract_stars, ExtractError, ExtractionConfig, Star};
pub use self::image::{array2_to_gray_image, gray_image_to_array2};
pub use io::{load_gray_image, mean_brightness, save_u8_image, ImageIoError};
