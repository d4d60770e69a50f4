//! Frame I/O for 8-bit grayscale rasters.
//!
//! Input frames are JPEG or PNG files of any colour type; they are reduced to
//! luma on load. Stacked output is always written as 8-bit grayscale, with
//! the file format determined by the path's extension.

use std::path::{Path, PathBuf};

use image::ImageReader;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use super::image::{array2_to_gray_image, gray_image_to_array2};

#[derive(Error, Debug)]
pub enum ImageIoError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write image {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load an image file as an 8-bit grayscale array of shape `(height, width)`.
///
/// The format is detected from the file contents, not the extension.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> Result<Array2<u8>, ImageIoError> {
    let path = path.as_ref();
    let read_err = |source: image::ImageError| ImageIoError::Read {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| read_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(read_err)?;
    Ok(gray_image_to_array2(&img.to_luma8()))
}

/// Save 8-bit grayscale image to standard image format (PNG, JPEG, etc.).
///
/// Parent directories are created as needed.
pub fn save_u8_image<P: AsRef<Path>>(image: &Array2<u8>, path: P) -> Result<(), ImageIoError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ImageIoError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    array2_to_gray_image(image)
        .save(path)
        .map_err(|source| ImageIoError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Mean pixel value of a frame, 0.0 for an empty frame.
pub fn mean_brightness(image: &ArrayView2<u8>) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    let total: u64 = image.iter().map(|&v| v as u64).sum();
    total as f64 / image.len() as f64
}
