//! Projection of region proposals into the scale pyramid.
//!
//! With several pyramid levels, each proposal is assigned to the level where
//! its scaled area lands closest to `224 x 224`, the canonical input size the
//! classifier was trained on.

use crate::bbox::BBox;
use crate::tensor::Matrix;
use crate::util::math::argmin_first;
use crate::util::{DetPostError, DetPostResult};

/// Target area used to pick a pyramid level for each RoI.
pub const CANONICAL_AREA: f64 = 224.0 * 224.0;

/// A candidate region in original image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionProposal {
    pub bbox: BBox,
    /// Ground-truth class, `0` for a plain proposal.
    pub gt_class: u32,
}

impl RegionProposal {
    pub fn new(bbox: BBox) -> Self {
        Self { bbox, gt_class: 0 }
    }

    pub fn ground_truth(bbox: BBox, gt_class: u32) -> Self {
        Self { bbox, gt_class }
    }
}

/// Returns the boxes of proposals that are not ground-truth annotations.
pub fn detection_proposals(proposals: &[RegionProposal]) -> Vec<BBox> {
    proposals
        .iter()
        .filter(|p| p.gt_class == 0)
        .map(|p| p.bbox)
        .collect()
}

/// A RoI mapped onto one pyramid level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedRoi {
    pub level: usize,
    pub bbox: BBox,
}

impl ProjectedRoi {
    /// Returns the `[level, x1, y1, x2, y2]` network row.
    pub fn to_row(self) -> [f32; 5] {
        [
            self.level as f32,
            self.bbox.x1,
            self.bbox.y1,
            self.bbox.x2,
            self.bbox.y2,
        ]
    }
}

/// Maps RoIs onto the pyramid described by `scales`.
pub fn project_rois(rois: &[BBox], scales: &[f64]) -> DetPostResult<Vec<ProjectedRoi>> {
    if scales.is_empty() {
        return Err(DetPostError::InvalidConfig("at least one scale factor is required"));
    }
    let single = scales.len() == 1;
    let projected = rois
        .iter()
        .map(|roi| {
            let level = if single {
                0
            } else {
                let area = f64::from(roi.width()) * f64::from(roi.height());
                argmin_first(scales.iter().map(|s| (area * s * s - CANONICAL_AREA).abs()))
                    .unwrap_or(0)
            };
            ProjectedRoi {
                level,
                bbox: roi.scaled(scales[level]),
            }
        })
        .collect();
    Ok(projected)
}

/// Stacks projected RoIs into an `R x 5` matrix.
pub fn rois_blob(rois: &[ProjectedRoi]) -> DetPostResult<Matrix> {
    let data = rois.iter().flat_map(|r| r.to_row()).collect();
    Matrix::new(data, rois.len(), 5)
}
