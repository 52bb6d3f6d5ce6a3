//! Test-time configuration for the detection pipeline.

use crate::image::pyramid::PyramidConfig;
use crate::image::CHANNELS;
use crate::util::{DetPostError, DetPostResult};

/// Options consumed by `im_detect`, post-processing, and the dataset loop.
#[derive(Clone, Debug, PartialEq)]
pub struct TestConfig {
    /// Per-channel means subtracted from input pixels.
    pub pixel_means: [f32; CHANNELS],
    /// Target short-side sizes, one pyramid level each.
    pub scales: Vec<u32>,
    /// Long-side cap after scaling.
    pub max_size: u32,
    /// Blob dimensions are rounded up to a multiple of this.
    pub size_stride: usize,
    /// The network proposes its own RoIs from an `im_info` record.
    pub has_rpn: bool,
    /// Use raw classifier scores instead of softmax probabilities.
    pub svm: bool,
    /// Apply box-regression deltas.
    pub bbox_reg: bool,
    /// IoU threshold for per-class NMS.
    pub nms: f32,
    /// Dedup resolution; `<= 0` disables RoI deduplication.
    pub dedup_boxes: f32,
    /// Cap on detections per image across classes; `0` disables the cap.
    pub max_per_image: usize,
    /// Candidates must score strictly above this to reach NMS.
    pub score_thresh: f32,
}

impl Default for TestConfig {
    fn default() -> Self {
        let pyramid = PyramidConfig::default();
        Self {
            pixel_means: pyramid.pixel_means,
            scales: pyramid.scales,
            max_size: pyramid.max_size,
            size_stride: pyramid.size_stride,
            has_rpn: false,
            svm: false,
            bbox_reg: true,
            nms: 0.3,
            dedup_boxes: 1.0 / 16.0,
            max_per_image: 100,
            score_thresh: 0.3,
        }
    }
}

impl TestConfig {
    /// Checks ranges that the pipeline relies on.
    pub fn validate(&self) -> DetPostResult<()> {
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
        if !(self.nms > 0.0 && self.nms <= 1.0) {
            return Err(DetPostError::InvalidConfig("nms threshold must be in (0, 1]"));
        }
        if !self.dedup_boxes.is_finite() || !self.score_thresh.is_finite() {
            return Err(DetPostError::InvalidConfig("thresholds must be finite"));
        }
        if self.pixel_means.iter().any(|m| !m.is_finite()) {
            return Err(DetPostError::InvalidConfig("pixel means must be finite"));
        }
        if self.has_rpn && self.scales.len() != 1 {
            return Err(DetPostError::InvalidConfig(
                "RPN mode supports a single test scale",
            ));
        }
        Ok(())
    }

    /// Returns the pyramid parameters.
    pub fn pyramid(&self) -> PyramidConfig {
        PyramidConfig {
            scales: self.scales.clone(),
            max_size: self.max_size,
            pixel_means: self.pixel_means,
            size_stride: self.size_stride,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TestConfig;
    use crate::util::DetPostError;

    #[test]
    fn defaults_are_valid() {
        TestConfig::default().validate().unwrap();
    }

    #[test]
    fn rpn_requires_single_scale() {
        let cfg = TestConfig {
            has_rpn: true,
            scales: vec![480, 600],
            ..TestConfig::default()
        };
        assert_eq!(
            cfg.validate().unwrap_err(),
            DetPostError::InvalidConfig("RPN mode supports a single test scale")
        );
    }

    #[test]
    fn nms_threshold_range() {
        let cfg = TestConfig {
            nms: 0.0,
            ..TestConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
