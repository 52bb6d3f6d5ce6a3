//! Single-image detection: network inputs, output decoding, per-class NMS.

use crate::aggregate::{cap_per_image, Detection, DetectionSet};
use crate::bbox::{bbox_transform_inv, BBox, ClassBoxes};
use crate::config::TestConfig;
use crate::dedup::DedupPlan;
use crate::image::pyramid::ScalePyramid;
use crate::image::Image;
use crate::net::{ImInfo, Network, NetworkInputs, NetworkOutputs, RoiInput};
use crate::roi::{project_rois, rois_blob};
use crate::tensor::Matrix;
use crate::trace::{trace_event, trace_span};
use crate::util::{DetPostError, DetPostResult};

/// Decoded per-RoI network outputs in original image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetections {
    /// `R x C` class scores.
    pub scores: Matrix,
    /// Clipped predicted box per RoI and class.
    pub boxes: ClassBoxes,
    /// Clipped keypoint box per RoI and class, when the network has that head.
    pub keypoints: Option<ClassBoxes>,
}

impl RawDetections {
    pub fn num_rois(&self) -> usize {
        self.scores.rows()
    }

    pub fn num_classes(&self) -> usize {
        self.scores.cols()
    }
}

/// Runs the network on one image and decodes its outputs.
///
/// `proposals` are required unless `cfg.has_rpn` is set, in which case they
/// are ignored and the network's own RoIs are used.
pub fn im_detect<N: Network + ?Sized>(
    net: &mut N,
    image: &Image,
    proposals: Option<&[BBox]>,
    cfg: &TestConfig,
) -> DetPostResult<RawDetections> {
    cfg.validate()?;
    let _span = trace_span!(
        "im_detect",
        width = image.width(),
        height = image.height()
    )
    .entered();

    let pyramid = ScalePyramid::build(image, &cfg.pyramid())?;
    let scales = pyramid.scale_factors();

    let mut plan = None;
    let (roi_input, sent_boxes) = if cfg.has_rpn {
        let blob = pyramid.blob();
        let info = ImInfo {
            height: blob.height() as f32,
            width: blob.width() as f32,
            scale: scales[0] as f32,
        };
        (RoiInput::ImInfo(info), None)
    } else {
        let boxes = proposals.ok_or(DetPostError::InvalidConfig(
            "proposals are required when the network has no RPN",
        ))?;
        let mut rois = project_rois(boxes, scales)?;
        let mut boxes = boxes.to_vec();
        if let Some(p) = DedupPlan::build(&rois, cfg.dedup_boxes) {
            rois = p.reduce(&rois)?;
            boxes = p.reduce(&boxes)?;
            plan = Some(p);
        }
        (RoiInput::Rois(rois_blob(&rois)?), Some(boxes))
    };

    let inputs = NetworkInputs {
        data: pyramid.blob(),
        roi_input,
    };
    let outputs = net.forward(&inputs)?;

    let boxes = match sent_boxes {
        Some(boxes) => {
            outputs.cls_prob().expect_rows("network output rows", boxes.len())?;
            boxes
        }
        None => rpn_boxes(&outputs, scales[0])?,
    };

    let mut scores = if cfg.svm {
        outputs
            .cls_score()
            .ok_or(DetPostError::MissingOutput("cls_score"))?
            .clone()
    } else {
        outputs.cls_prob().clone()
    };

    let mut pred_boxes = if cfg.bbox_reg {
        let deltas = outputs
            .bbox_pred()
            .ok_or(DetPostError::MissingOutput("bbox_pred"))?;
        bbox_transform_inv(&boxes, deltas)?
    } else {
        ClassBoxes::tiled(&boxes, scores.cols())
    };
    pred_boxes.clip(image.width(), image.height());

    let mut keypoints = match outputs.key_pred() {
        Some(deltas) => {
            let mut keys = bbox_transform_inv(&boxes, deltas)?;
            keys.clip(image.width(), image.height());
            Some(keys)
        }
        None => None,
    };

    if let Some(plan) = &plan {
        scores = plan.expand(&scores)?;
        pred_boxes = pred_boxes.gather_rois(plan.inverse_index())?;
        keypoints = keypoints
            .map(|k| k.gather_rois(plan.inverse_index()))
            .transpose()?;
    }

    trace_event!("im_detect_rois", rois = scores.rows());
    Ok(RawDetections {
        scores,
        boxes: pred_boxes,
        keypoints,
    })
}

/// Maps RPN RoIs from pyramid coordinates back to the original image.
fn rpn_boxes(outputs: &NetworkOutputs, scale: f64) -> DetPostResult<Vec<BBox>> {
    let rois = outputs.rois().ok_or(DetPostError::MissingOutput("rois"))?;
    let unscale = |v: f32| (f64::from(v) / scale) as f32;
    (0..rois.rows())
        .map(|r| {
            let row = rois.row(r).ok_or(DetPostError::IndexOutOfBounds {
                index: r,
                len: rois.rows(),
                context: "rois",
            })?;
            Ok(BBox::new(
                unscale(row[1]),
                unscale(row[2]),
                unscale(row[3]),
                unscale(row[4]),
            ))
        })
        .collect()
}

/// Turns decoded outputs into per-class detection sets for one image.
///
/// For each foreground class, candidates scoring above `score_thresh` go
/// through NMS; keypoint boxes ride along with their detections. The result
/// has one set per class (background empty) and is capped by
/// `max_per_image`.
pub fn postprocess(raw: &RawDetections, cfg: &TestConfig) -> DetPostResult<Vec<DetectionSet>> {
    let num_classes = raw.num_classes();
    if raw.boxes.num_rois() != raw.num_rois() {
        return Err(DetPostError::ShapeMismatch {
            context: "predicted box rows",
            expected: raw.num_rois(),
            got: raw.boxes.num_rois(),
        });
    }

    let mut sets = Vec::with_capacity(num_classes);
    sets.push(DetectionSet::default());
    for class in 1..num_classes {
        let mut candidates = Vec::new();
        for roi in 0..raw.num_rois() {
            let score = raw.scores.get(roi, class).unwrap_or(f32::NEG_INFINITY);
            if !(score > cfg.score_thresh) {
                continue;
            }
            let bbox = raw.boxes.get(roi, class).ok_or(DetPostError::IndexOutOfBounds {
                index: class,
                len: raw.boxes.num_classes(),
                context: "class",
            })?;
            let mut det = Detection::new(bbox, score);
            if let Some(keys) = raw.keypoints.as_ref().and_then(|k| k.get(roi, class)) {
                det = det.with_keypoints(keys);
            }
            candidates.push(det);
        }
        sets.push(DetectionSet::new(candidates).nms(cfg.nms));
    }

    cap_per_image(&mut sets, cfg.max_per_image);
    Ok(sets)
}

/// Runs [`im_detect`] and [`postprocess`] on one image.
pub fn detect_image<N: Network + ?Sized>(
    net: &mut N,
    image: &Image,
    proposals: Option<&[BBox]>,
    cfg: &TestConfig,
) -> DetPostResult<Vec<DetectionSet>> {
    let raw = im_detect(net, image, proposals, cfg)?;
    postprocess(&raw, cfg)
}
