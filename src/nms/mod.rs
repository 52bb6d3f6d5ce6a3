//! Greedy per-class non-maximum suppression.
//!
//! Candidates are visited in descending score order (equal scores keep their
//! input order) and a candidate is kept only if its IoU with every kept box is
//! below the threshold. IoU uses inclusive pixel extents.

use crate::aggregate::Detection;
use crate::trace::{trace_event, trace_span};
use crate::util::math::score_desc;

mod scalar;
#[cfg(feature = "simd")]
mod simd;

pub use scalar::nms_scalar;
#[cfg(feature = "simd")]
pub use simd::nms_simd;

#[cfg(not(feature = "simd"))]
use scalar::suppress;
#[cfg(feature = "simd")]
use simd::suppress;

/// Returns candidate indices sorted by descending score, ties by index.
///
/// NaN scores sort after every number.
pub(crate) fn score_order(dets: &[Detection]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dets.len()).collect();
    order.sort_by(|&a, &b| score_desc(dets[a].score, dets[b].score).then_with(|| a.cmp(&b)));
    order
}

/// Runs NMS and returns the kept indices in descending score order.
///
/// A candidate is suppressed when its IoU with a kept box is `>= thresh`.
pub fn nms(dets: &[Detection], thresh: f32) -> Vec<usize> {
    let _span = trace_span!("nms", candidates = dets.len()).entered();
    if dets.is_empty() {
        return Vec::new();
    }
    let keep = suppress(dets, &score_order(dets), thresh);
    trace_event!("nms_kept", kept = keep.len());
    keep
}
