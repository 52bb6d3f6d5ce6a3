//! Axis-aligned boxes in inclusive pixel coordinates.
//!
//! Widths and heights count both boundary pixels (`x2 - x1 + 1`), and IoU
//! uses the same convention.

mod transform;

pub use transform::{bbox_transform_inv, ClassBoxes};

/// Box given by its top-left `(x1, y1)` and bottom-right `(x2, y2)` corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub const fn from_array([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Inclusive width.
    pub fn width(&self) -> f32 {
        self.x2 - self.x1 + 1.0
    }

    /// Inclusive height.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1 + 1.0
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; disjoint boxes give `0.0`.
    pub fn iou(&self, other: &BBox) -> f32 {
        let xx1 = self.x1.max(other.x1);
        let yy1 = self.y1.max(other.y1);
        let xx2 = self.x2.min(other.x2);
        let yy2 = self.y2.min(other.y2);
        let w = (xx2 - xx1 + 1.0).max(0.0);
        let h = (yy2 - yy1 + 1.0).max(0.0);
        let inter = w * h;
        inter / (self.area() + other.area() - inter)
    }

    /// Multiplies every coordinate by `scale`.
    pub fn scaled(&self, scale: f64) -> Self {
        let s = |v: f32| (f64::from(v) * scale) as f32;
        Self::new(s(self.x1), s(self.y1), s(self.x2), s(self.y2))
    }

    /// Clamps every coordinate into `[0, width - 1] x [0, height - 1]`.
    pub fn clipped(&self, width: usize, height: usize) -> Self {
        let max_x = width as f32 - 1.0;
        let max_y = height as f32 - 1.0;
        Self::new(
            self.x1.min(max_x).max(0.0),
            self.y1.min(max_y).max(0.0),
            self.x2.min(max_x).max(0.0),
            self.y2.min(max_y).max(0.0),
        )
    }
}
