//! Scalar suppression loop.

use crate::aggregate::Detection;

pub(crate) fn suppress(dets: &[Detection], order: &[usize], thresh: f32) -> Vec<usize> {
    let mut keep: Vec<usize> = Vec::new();
    'outer: for &idx in order {
        let cand = &dets[idx].bbox;
        for &kept in &keep {
            if cand.iou(&dets[kept].bbox) >= thresh {
                continue 'outer;
            }
        }
        keep.push(idx);
    }
    keep
}

/// Scalar NMS regardless of enabled features.
pub fn nms_scalar(dets: &[Detection], thresh: f32) -> Vec<usize> {
    suppress(dets, &super::score_order(dets), thresh)
}
