//! Owned 3-channel images and multi-scale preprocessing.
//!
//! `Image` stores interleaved channels in row-major order (`HWC`) as `f32`.
//! Channel order follows whatever the caller loaded; the pixel means in
//! [`PyramidConfig`](pyramid::PyramidConfig) must use the same order (BGR for
//! the stock Fast R-CNN means).

use crate::util::{DetPostError, DetPostResult};

pub mod pyramid;
pub(crate) mod resize;

#[cfg(feature = "image-io")]
pub mod io;

/// Number of interleaved channels per pixel.
pub const CHANNELS: usize = 3;

/// Owned contiguous 3-channel image.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl Image {
    /// Creates an image from an interleaved `HWC` buffer.
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> DetPostResult<Self> {
        let needed = required_len(width, height)?;
        if data.len() < needed {
            return Err(DetPostError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(DetPostError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates an image from 8-bit interleaved pixels.
    pub fn from_u8(data: &[u8], width: usize, height: usize) -> DetPostResult<Self> {
        Self::new(data.iter().map(|&v| f32::from(v)).collect(), width, height)
    }

    /// Creates a zero-filled image.
    pub fn zeros(width: usize, height: usize) -> DetPostResult<Self> {
        let needed = required_len(width, height)?;
        Self::new(vec![0.0; needed], width, height)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the interleaved backing buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns row `y` as `width * CHANNELS` interleaved values.
    pub fn row(&self, y: usize) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        let len = self.width * CHANNELS;
        let start = y * len;
        self.data.get(start..start + len)
    }

    /// Returns the channels of pixel `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[f32]> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        row.get(x * CHANNELS..(x + 1) * CHANNELS)
    }

    /// Returns a copy with `means[c]` subtracted from channel `c`.
    pub fn subtract_means(&self, means: [f32; CHANNELS]) -> Self {
        let data = self
            .data
            .chunks_exact(CHANNELS)
            .flat_map(|px| [px[0] - means[0], px[1] - means[1], px[2] - means[2]])
            .collect();
        Self {
            data,
            width: self.width,
            height: self.height,
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

fn required_len(width: usize, height: usize) -> DetPostResult<usize> {
    if width == 0 || height == 0 {
        return Err(DetPostError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or(DetPostError::InvalidDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::Image;
    use crate::util::DetPostError;

    #[test]
    fn rejects_zero_dimensions() {
        let err = Image::new(Vec::new(), 0, 4).unwrap_err();
        assert_eq!(
            err,
            DetPostError::InvalidDimensions {
                width: 0,
                height: 4
            }
        );
    }

    #[test]
    fn rejects_short_buffer() {
        let err = Image::new(vec![0.0; 5], 1, 2).unwrap_err();
        assert_eq!(err, DetPostError::BufferTooSmall { needed: 6, got: 5 });
    }

    #[test]
    fn pixel_access_is_interleaved() {
        let data: Vec<u8> = (0u8..12).collect();
        let img = Image::from_u8(&data, 2, 2).unwrap();
        assert_eq!(img.pixel(1, 0).unwrap(), &[3.0, 4.0, 5.0]);
        assert_eq!(img.pixel(0, 1).unwrap(), &[6.0, 7.0, 8.0]);
        assert!(img.pixel(2, 0).is_none());
    }

    #[test]
    fn subtract_means_is_per_channel() {
        let img = Image::new(vec![10.0, 20.0, 30.0], 1, 1).unwrap();
        let out = img.subtract_means([1.0, 2.0, 3.0]);
        assert_eq!(out.data(), &[9.0, 18.0, 27.0]);
    }
}
