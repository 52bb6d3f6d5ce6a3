//! Box-regression delta inversion and per-class box tables.

use crate::bbox::BBox;
use crate::tensor::Matrix;
use crate::util::{DetPostError, DetPostResult};

/// Predicted boxes for every `(roi, class)` pair, stored roi-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassBoxes {
    boxes: Vec<BBox>,
    num_rois: usize,
    num_classes: usize,
}

impl ClassBoxes {
    /// Repeats each box once per class; used when regression is disabled.
    pub fn tiled(boxes: &[BBox], num_classes: usize) -> Self {
        let mut out = Vec::with_capacity(boxes.len() * num_classes);
        for b in boxes {
            out.extend(std::iter::repeat(*b).take(num_classes));
        }
        Self {
            boxes: out,
            num_rois: boxes.len(),
            num_classes,
        }
    }

    pub fn num_rois(&self) -> usize {
        self.num_rois
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns the box predicted for `roi` under class `class`.
    pub fn get(&self, roi: usize, class: usize) -> Option<BBox> {
        if roi >= self.num_rois || class >= self.num_classes {
            return None;
        }
        self.boxes.get(roi * self.num_classes + class).copied()
    }

    /// Returns all class boxes for one RoI.
    pub fn roi(&self, roi: usize) -> Option<&[BBox]> {
        if roi >= self.num_rois {
            return None;
        }
        self.boxes
            .get(roi * self.num_classes..(roi + 1) * self.num_classes)
    }

    /// Clamps every box to the image bounds.
    pub fn clip(&mut self, width: usize, height: usize) {
        for b in &mut self.boxes {
            *b = b.clipped(width, height);
        }
    }

    /// Returns a table whose RoI `i` is RoI `indices[i]` of `self`.
    pub fn gather_rois(&self, indices: &[usize]) -> DetPostResult<Self> {
        let mut boxes = Vec::with_capacity(indices.len() * self.num_classes);
        for &idx in indices {
            let row = self.roi(idx).ok_or(DetPostError::IndexOutOfBounds {
                index: idx,
                len: self.num_rois,
                context: "roi",
            })?;
            boxes.extend_from_slice(row);
        }
        Ok(Self {
            boxes,
            num_rois: indices.len(),
            num_classes: self.num_classes,
        })
    }
}

/// Applies `(dx, dy, dw, dh)` deltas to `boxes`, one 4-column group per class.
///
/// `deltas` must have one row per box and `4 * num_classes` columns. Centers
/// shift by `dx * width`, extents scale by `exp(dw)`; no clamping is applied
/// to the exponent.
pub fn bbox_transform_inv(boxes: &[BBox], deltas: &Matrix) -> DetPostResult<ClassBoxes> {
    deltas.expect_rows("box deltas", boxes.len())?;
    if deltas.cols() % 4 != 0 {
        return Err(DetPostError::ShapeMismatch {
            context: "box delta columns",
            expected: deltas.cols().next_multiple_of(4),
            got: deltas.cols(),
        });
    }
    let num_classes = deltas.cols() / 4;
    let mut out = Vec::with_capacity(boxes.len() * num_classes);

    for (r, b) in boxes.iter().enumerate() {
        let row = deltas.row(r).ok_or(DetPostError::IndexOutOfBounds {
            index: r,
            len: deltas.rows(),
            context: "box deltas",
        })?;
        let width = b.width();
        let height = b.height();
        let ctr_x = b.x1 + 0.5 * width;
        let ctr_y = b.y1 + 0.5 * height;

        for d in row.chunks_exact(4) {
            let pred_ctr_x = d[0] * width + ctr_x;
            let pred_ctr_y = d[1] * height + ctr_y;
            let pred_w = d[2].exp() * width;
            let pred_h = d[3].exp() * height;
            out.push(BBox::new(
                pred_ctr_x - 0.5 * pred_w,
                pred_ctr_y - 0.5 * pred_h,
                pred_ctr_x + 0.5 * pred_w,
                pred_ctr_y + 0.5 * pred_h,
            ));
        }
    }

    Ok(ClassBoxes {
        boxes: out,
        num_rois: boxes.len(),
        num_classes,
    })
}

#[cfg(test)]
mod tests {
    use super::{bbox_transform_inv, ClassBoxes};
    use crate::bbox::BBox;
    use crate::tensor::Matrix;

    #[test]
    fn zero_deltas_reproduce_inclusive_box_shifted_by_half() {
        // Inclusive width 10 centred at 5.0 gives 0.0..10.0.
        let boxes = [BBox::new(0.0, 0.0, 9.0, 19.0)];
        let deltas = Matrix::new(vec![0.0; 4], 1, 4).unwrap();
        let out = bbox_transform_inv(&boxes, &deltas).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), BBox::new(0.0, 0.0, 10.0, 20.0));
    }

    #[test]
    fn deltas_shift_and_scale_per_class() {
        let boxes = [BBox::new(10.0, 10.0, 19.0, 19.0)];
        let two = 2.0f32.ln();
        let deltas = Matrix::new(vec![0.0, 0.0, 0.0, 0.0, 0.5, -0.5, two, 0.0], 1, 8).unwrap();
        let out = bbox_transform_inv(&boxes, &deltas).unwrap();
        assert_eq!(out.num_classes(), 2);
        let b = out.get(0, 1).unwrap();
        // centre (15, 15) -> (20, 10); width 10 -> 20
        assert!((b.x1 - 10.0).abs() < 1e-4);
        assert!((b.x2 - 30.0).abs() < 1e-4);
        assert!((b.y1 - 5.0).abs() < 1e-4);
        assert!((b.y2 - 15.0).abs() < 1e-4);
    }

    #[test]
    fn rejects_partial_class_groups() {
        let boxes = [BBox::default()];
        let deltas = Matrix::new(vec![0.0; 6], 1, 6).unwrap();
        assert!(bbox_transform_inv(&boxes, &deltas).is_err());
    }

    #[test]
    fn tiled_and_clipped() {
        let mut t = ClassBoxes::tiled(&[BBox::new(-5.0, 0.0, 50.0, 5.0)], 3);
        t.clip(40, 40);
        for c in 0..3 {
            assert_eq!(t.get(0, c).unwrap(), BBox::new(0.0, 0.0, 39.0, 5.0));
        }
        assert!(t.get(0, 3).is_none());
        let g = t.gather_rois(&[0, 0]).unwrap();
        assert_eq!(g.num_rois(), 2);
    }
}
