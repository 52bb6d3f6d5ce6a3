//! Contract between the pipeline and an external detection network.
//!
//! The network is opaque: it receives the image blob plus either the projected
//! RoIs or an `im_info` record, and returns per-RoI score and delta matrices.
//! Outputs are validated when assembled so later stages can index freely.

use crate::image::pyramid::ImageBlob;
use crate::tensor::Matrix;
use crate::util::{DetPostError, DetPostResult};

/// Image metadata passed to networks that propose their own RoIs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImInfo {
    pub height: f32,
    pub width: f32,
    pub scale: f32,
}

/// Second network input, chosen by detector mode.
#[derive(Clone, Debug, PartialEq)]
pub enum RoiInput {
    /// `R x 5` rows of `[level, x1, y1, x2, y2]` in pyramid coordinates.
    Rois(Matrix),
    /// Blob size and scale for region-proposal networks.
    ImInfo(ImInfo),
}

/// Inputs for one forward pass (one image).
#[derive(Clone, Debug)]
pub struct NetworkInputs<'a> {
    pub data: &'a ImageBlob,
    pub roi_input: RoiInput,
}

/// Outputs of one forward pass.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkOutputs {
    cls_prob: Matrix,
    cls_score: Option<Matrix>,
    bbox_pred: Option<Matrix>,
    key_pred: Option<Matrix>,
    rois: Option<Matrix>,
}

impl NetworkOutputs {
    /// Starts from the softmax class probabilities (`R x C`).
    pub fn new(cls_prob: Matrix) -> DetPostResult<Self> {
        if cls_prob.cols() == 0 {
            return Err(DetPostError::ShapeMismatch {
                context: "cls_prob columns",
                expected: 1,
                got: 0,
            });
        }
        Ok(Self {
            cls_prob,
            cls_score: None,
            bbox_pred: None,
            key_pred: None,
            rois: None,
        })
    }

    /// Adds raw pre-softmax scores (`R x C`).
    pub fn with_cls_score(mut self, cls_score: Matrix) -> DetPostResult<Self> {
        cls_score.expect_rows("cls_score rows", self.num_rois())?;
        cls_score.expect_cols("cls_score columns", self.num_classes())?;
        self.cls_score = Some(cls_score);
        Ok(self)
    }

    /// Adds box-regression deltas (`R x 4C`).
    pub fn with_bbox_pred(mut self, bbox_pred: Matrix) -> DetPostResult<Self> {
        bbox_pred.expect_rows("bbox_pred rows", self.num_rois())?;
        bbox_pred.expect_cols("bbox_pred columns", 4 * self.num_classes())?;
        self.bbox_pred = Some(bbox_pred);
        Ok(self)
    }

    /// Adds auxiliary keypoint-box deltas (`R x 4C`).
    pub fn with_key_pred(mut self, key_pred: Matrix) -> DetPostResult<Self> {
        key_pred.expect_rows("key_pred rows", self.num_rois())?;
        key_pred.expect_cols("key_pred columns", 4 * self.num_classes())?;
        self.key_pred = Some(key_pred);
        Ok(self)
    }

    /// Adds network-proposed RoIs (`R x 5`, pyramid coordinates).
    pub fn with_rois(mut self, rois: Matrix) -> DetPostResult<Self> {
        rois.expect_rows("rois rows", self.num_rois())?;
        rois.expect_cols("rois columns", 5)?;
        self.rois = Some(rois);
        Ok(self)
    }

    pub fn num_rois(&self) -> usize {
        self.cls_prob.rows()
    }

    /// Class count including background.
    pub fn num_classes(&self) -> usize {
        self.cls_prob.cols()
    }

    pub fn cls_prob(&self) -> &Matrix {
        &self.cls_prob
    }

    pub fn cls_score(&self) -> Option<&Matrix> {
        self.cls_score.as_ref()
    }

    pub fn bbox_pred(&self) -> Option<&Matrix> {
        self.bbox_pred.as_ref()
    }

    pub fn key_pred(&self) -> Option<&Matrix> {
        self.key_pred.as_ref()
    }

    pub fn rois(&self) -> Option<&Matrix> {
        self.rois.as_ref()
    }
}

/// A detection network evaluated synchronously on one image at a time.
pub trait Network {
    fn forward(&mut self, inputs: &NetworkInputs<'_>) -> DetPostResult<NetworkOutputs>;
}

impl<N: Network + ?Sized> Network for &mut N {
    fn forward(&mut self, inputs: &NetworkInputs<'_>) -> DetPostResult<NetworkOutputs> {
        (**self).forward(inputs)
    }
}

impl<N: Network + ?Sized> Network for Box<N> {
    fn forward(&mut self, inputs: &NetworkInputs<'_>) -> DetPostResult<NetworkOutputs> {
        (**self).forward(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::NetworkOutputs;
    use crate::tensor::Matrix;
    use crate::util::DetPostError;

    #[test]
    fn heads_must_agree_on_shape() {
        let prob = Matrix::new(vec![0.5; 6], 2, 3).unwrap();
        let out = NetworkOutputs::new(prob).unwrap();
        let err = out
            .clone()
            .with_bbox_pred(Matrix::new(vec![0.0; 16], 2, 8).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            DetPostError::ShapeMismatch {
                context: "bbox_pred columns",
                expected: 12,
                got: 8,
            }
        );
        let err = out
            .with_rois(Matrix::new(vec![0.0; 5], 1, 5).unwrap())
            .unwrap_err();
        assert!(matches!(err, DetPostError::ShapeMismatch { context: "rois rows", .. }));
    }
}
