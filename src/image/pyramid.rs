//! Multi-scale image pyramid and the batched network input blob.
//!
//! Each level rescales the mean-subtracted image so its short side matches a
//! target size, unless that would push the long side past `max_size`, in which
//! case the long side is pinned to `max_size` instead. Levels are then packed
//! into one zero-padded `NCHW` blob sized to the largest level.

use crate::image::resize::resize_bilinear;
use crate::image::{Image, CHANNELS};
use crate::trace::{trace_event, trace_span};
use crate::util::math::round_half_even;
use crate::util::{DetPostError, DetPostResult};

/// Parameters for building a scale pyramid.
#[derive(Clone, Debug, PartialEq)]
pub struct PyramidConfig {
    /// Target short-side sizes, one pyramid level each.
    pub scales: Vec<u32>,
    /// Upper bound on the long side after scaling.
    pub max_size: u32,
    /// Per-channel means subtracted before resizing.
    pub pixel_means: [f32; CHANNELS],
    /// Blob height and width are rounded up to a multiple of this.
    pub size_stride: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            scales: vec![600],
            max_size: 1000,
            pixel_means: [102.9801, 115.9465, 122.7717],
            size_stride: 1,
        }
    }
}

impl PyramidConfig {
    /// Computes the scale factor for one target size on a `width x height` image.
    pub fn scale_for(&self, target_size: u32, width: usize, height: usize) -> DetPostResult<f64> {
        let min_side = width.min(height);
        let max_side = width.max(height);
        if min_side == 0 {
            return Err(DetPostError::InvalidDimensions { width, height });
        }
        let mut scale = f64::from(target_size) / min_side as f64;
        if round_half_even(scale * max_side as f64) > f64::from(self.max_size) {
            scale = f64::from(self.max_size) / max_side as f64;
        }
        Ok(scale)
    }

    fn validate(&self) -> DetPostResult<()> {
        if self.scales.is_empty() {
            return Err(DetPostError::InvalidConfig("at least one test scale is required"));
        }
        if self.scales.contains(&0) {
            return Err(DetPostError::InvalidConfig("test scales must be positive"));
        }
        if self.max_size == 0 {
            return Err(DetPostError::InvalidConfig("max_size must be positive"));
        }
        if self.size_stride == 0 {
            return Err(DetPostError::InvalidConfig("size_stride must be positive"));
        }
        Ok(())
    }
}

/// Zero-padded `N x C x H x W` batch of pyramid levels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlob {
    data: Vec<f32>,
    num_levels: usize,
    height: usize,
    width: usize,
}

impl ImageBlob {
    /// Packs images into a shared canvas, padding each to `height x width`.
    pub fn from_images(images: &[Image], size_stride: usize) -> DetPostResult<Self> {
        if images.is_empty() {
            return Err(DetPostError::InvalidConfig("blob requires at least one image"));
        }
        let stride = size_stride.max(1);
        let max_h = images.iter().map(Image::height).max().unwrap_or(0);
        let max_w = images.iter().map(Image::width).max().unwrap_or(0);
        let height = max_h.div_ceil(stride) * stride;
        let width = max_w.div_ceil(stride) * stride;

        let plane = height * width;
        let mut data = vec![0.0f32; images.len() * CHANNELS * plane];
        for (n, img) in images.iter().enumerate() {
            for y in 0..img.height() {
                let row = img.row(y).ok_or(DetPostError::IndexOutOfBounds {
                    index: y,
                    len: img.height(),
                    context: "row",
                })?;
                for (x, px) in row.chunks_exact(CHANNELS).enumerate() {
                    for (c, &value) in px.iter().enumerate() {
                        data[(n * CHANNELS + c) * plane + y * width + x] = value;
                    }
                }
            }
        }

        Ok(Self {
            data,
            num_levels: images.len(),
            height,
            width,
        })
    }

    /// Returns the number of batched levels.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Returns the padded canvas height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the padded canvas width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the `[N, C, H, W]` shape.
    pub fn shape(&self) -> [usize; 4] {
        [self.num_levels, CHANNELS, self.height, self.width]
    }

    /// Returns the flat `NCHW` buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the value at `(level, channel, y, x)`.
    pub fn get(&self, level: usize, channel: usize, y: usize, x: usize) -> Option<f32> {
        if level >= self.num_levels || channel >= CHANNELS || y >= self.height || x >= self.width
        {
            return None;
        }
        let idx = ((level * CHANNELS + channel) * self.height + y) * self.width + x;
        self.data.get(idx).copied()
    }
}

/// Rescaled copies of one image plus the batched blob fed to the network.
#[derive(Clone, Debug)]
pub struct ScalePyramid {
    levels: Vec<Image>,
    scale_factors: Vec<f64>,
    blob: ImageBlob,
}

impl ScalePyramid {
    /// Builds the pyramid: subtract means, rescale per target size, batch.
    pub fn build(image: &Image, cfg: &PyramidConfig) -> DetPostResult<Self> {
        cfg.validate()?;
        let _span = trace_span!(
            "build_pyramid",
            width = image.width(),
            height = image.height(),
            levels = cfg.scales.len()
        )
        .entered();

        let centered = image.subtract_means(cfg.pixel_means);
        let mut levels = Vec::with_capacity(cfg.scales.len());
        let mut scale_factors = Vec::with_capacity(cfg.scales.len());
        for &target in &cfg.scales {
            let scale = cfg.scale_for(target, image.width(), image.height())?;
            levels.push(resize_bilinear(&centered, scale)?);
            scale_factors.push(scale);
        }
        let blob = ImageBlob::from_images(&levels, cfg.size_stride)?;

        trace_event!(
            "pyramid_built",
            blob_height = blob.height(),
            blob_width = blob.width()
        );
        Ok(Self {
            levels,
            scale_factors,
            blob,
        })
    }

    /// Returns the resized levels in configuration order.
    pub fn levels(&self) -> &[Image] {
        &self.levels
    }

    /// Returns the scale factor of each level relative to the input image.
    pub fn scale_factors(&self) -> &[f64] {
        &self.scale_factors
    }

    /// Returns the batched network input.
    pub fn blob(&self) -> &ImageBlob {
        &self.blob
    }

    /// Consumes the pyramid and returns its blob.
    pub fn into_blob(self) -> ImageBlob {
        self.blob
    }
}
