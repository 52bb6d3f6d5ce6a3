//! Loading images from disk via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Pixels are returned in
//! BGR order to match the default pixel means.

use crate::image::Image;
use crate::util::{DetPostError, DetPostResult};
use std::path::Path;

/// Converts an RGB buffer into a BGR `Image`.
pub fn image_from_rgb(img: &image::RgbImage) -> DetPostResult<Image> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img
        .as_raw()
        .chunks_exact(3)
        .flat_map(|px| [f32::from(px[2]), f32::from(px[1]), f32::from(px[0])])
        .collect();
    Image::new(data, width, height)
}

/// Loads an image file and converts it to a BGR `Image`.
pub fn load_bgr_image<P: AsRef<Path>>(path: P) -> DetPostResult<Image> {
    let img = image::open(path).map_err(|err| DetPostError::ImageIo {
        reason: err.to_string(),
    })?;
    image_from_rgb(&img.to_rgb8())
}
