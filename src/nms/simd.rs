//! SIMD suppression loop using the `wide` crate.
//!
//! Each candidate is tested against eight kept boxes at a time. Lane math
//! mirrors `BBox::iou` operation for operation so decisions match the scalar
//! loop exactly.

use crate::aggregate::Detection;
use wide::f32x8;

const LANES: usize = 8;

/// Kept boxes in structure-of-arrays layout, padded to full lanes.
#[derive(Default)]
struct KeptBoxes {
    x1: Vec<f32>,
    y1: Vec<f32>,
    x2: Vec<f32>,
    y2: Vec<f32>,
    area: Vec<f32>,
    len: usize,
}

impl KeptBoxes {
    fn push(&mut self, det: &Detection) {
        let b = det.bbox;
        if self.len % LANES == 0 {
            // Padding lanes are masked out by `len` in `overlaps`.
            for v in [&mut self.x1, &mut self.y1, &mut self.x2, &mut self.y2] {
                v.extend([0.0; LANES]);
            }
            self.area.extend([1.0; LANES]);
        }
        self.x1[self.len] = b.x1;
        self.y1[self.len] = b.y1;
        self.x2[self.len] = b.x2;
        self.y2[self.len] = b.y2;
        self.area[self.len] = b.area();
        self.len += 1;
    }

    fn overlaps(&self, det: &Detection, thresh: f32) -> bool {
        let b = det.bbox;
        let cx1 = f32x8::splat(b.x1);
        let cy1 = f32x8::splat(b.y1);
        let cx2 = f32x8::splat(b.x2);
        let cy2 = f32x8::splat(b.y2);
        let carea = f32x8::splat(b.area());
        let one = f32x8::splat(1.0);
        let zero = f32x8::ZERO;

        let mut start = 0;
        while start < self.len {
            let active = (self.len - start).min(LANES);
            let load = |v: &[f32]| {
                let mut lanes = [0.0f32; LANES];
                lanes.copy_from_slice(&v[start..start + LANES]);
                f32x8::from(lanes)
            };
            let xx1 = cx1.max(load(&self.x1));
            let yy1 = cy1.max(load(&self.y1));
            let xx2 = cx2.min(load(&self.x2));
            let yy2 = cy2.min(load(&self.y2));
            let w = (xx2 - xx1 + one).max(zero);
            let h = (yy2 - yy1 + one).max(zero);
            let inter = w * h;
            let iou = inter / (carea + load(&self.area) - inter);
            if iou.to_array()[..active].iter().any(|&v| v >= thresh) {
                return true;
            }
            start += LANES;
        }
        false
    }
}

pub(crate) fn suppress(dets: &[Detection], order: &[usize], thresh: f32) -> Vec<usize> {
    let mut kept = KeptBoxes::default();
    let mut keep = Vec::new();
    for &idx in order {
        let det = &dets[idx];
        if kept.overlaps(det, thresh) {
            continue;
        }
        kept.push(det);
        keep.push(idx);
    }
    keep
}

/// SIMD NMS; matches [`super::nms_scalar`] index for index.
pub fn nms_simd(dets: &[Detection], thresh: f32) -> Vec<usize> {
    suppress(dets, &super::score_order(dets), thresh)
}
