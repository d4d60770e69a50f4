//! Conversion between ndarray frames and image crate buffers.
//!
//! - **ndarray**: matrix indexing `[row, col] = [y, x]` with `(height, width)` dimensions
//! - **image crate**: graphics indexing `(x, y)` with `(width, height)` dimensions

use image::{GrayImage, Luma};
use ndarray::Array2;

/// Convert a u8 Array2 into a GrayImage.
pub fn array2_to_gray_image(arr: &Array2<u8>) -> GrayImage {
    let (height, width) = arr.dim();
    let mut img = GrayImage::new(width as u32, height as u32);

    for ((y, x), &value) in arr.indexed_iter() {
        img.put_pixel(x as u32, y as u32, Luma([value]));
    }

    img
}

/// Convert a GrayImage into a u8 Array2 of shape `(height, width)`.
pub fn gray_image_to_array2(img: &GrayImage) -> Array2<u8> {
    let (width, height) = img.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0]
    })
}
