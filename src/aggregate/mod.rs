//! Detection sets, the per-image cap, and dataset-wide accumulation.

mod persist;

pub use persist::DETECTIONS_FILE;

use crate::bbox::BBox;
use crate::nms::nms;
use crate::trace::trace_event;
use crate::util::math::kth_largest;
use crate::util::{DetPostError, DetPostResult};

/// A scored box, optionally paired with an auxiliary keypoint box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f32,
    pub keypoints: Option<BBox>,
}

impl Detection {
    pub fn new(bbox: BBox, score: f32) -> Self {
        Self {
            bbox,
            score,
            keypoints: None,
        }
    }

    pub fn with_keypoints(mut self, keypoints: BBox) -> Self {
        self.keypoints = Some(keypoints);
        self
    }

    /// Returns `[x1, y1, x2, y2, score]`.
    pub fn to_row(&self) -> [f32; 5] {
        let [x1, y1, x2, y2] = self.bbox.to_array();
        [x1, y1, x2, y2, self.score]
    }
}

/// Detections of one class in one image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn scores(&self) -> impl Iterator<Item = f32> + '_ {
        self.detections.iter().map(|d| d.score)
    }

    /// Returns the surviving detections after greedy NMS.
    pub fn nms(&self, thresh: f32) -> Self {
        let keep = nms(&self.detections, thresh);
        Self::new(keep.into_iter().map(|i| self.detections[i]).collect())
    }
}

impl FromIterator<Detection> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Limits one image's detections to `max_per_image` across all classes.
///
/// The Kth largest score becomes a shared threshold and every class keeps
/// detections scoring at least that much. If exact ties at the threshold
/// still leave too many, tied detections are dropped starting from the
/// highest class index and, within a class, from the end of its order.
/// A cap of `0` leaves the sets untouched.
pub fn cap_per_image(sets: &mut [DetectionSet], max_per_image: usize) {
    if max_per_image == 0 {
        return;
    }
    let scores: Vec<f32> = sets.iter().flat_map(|s| s.scores()).collect();
    if scores.len() <= max_per_image {
        return;
    }
    let Some(image_thresh) = kth_largest(&scores, max_per_image) else {
        return;
    };

    for set in sets.iter_mut() {
        set.detections.retain(|d| d.score >= image_thresh);
    }

    let mut excess = sets
        .iter()
        .map(DetectionSet::len)
        .sum::<usize>()
        .saturating_sub(max_per_image);
    for set in sets.iter_mut().rev() {
        while excess > 0 {
            let Some(pos) = set.detections.iter().rposition(|d| d.score == image_thresh) else {
                break;
            };
            set.detections.remove(pos);
            excess -= 1;
        }
    }

    trace_event!("image_cap", threshold = image_thresh);
}

/// Per-class, per-image detections for a whole dataset pass.
///
/// Class `0` is background and always stays empty.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetResults {
    num_classes: usize,
    num_images: usize,
    sets: Vec<DetectionSet>,
}

impl DatasetResults {
    /// Creates empty results for `num_classes` classes and `num_images` images.
    pub fn new(num_classes: usize, num_images: usize) -> Self {
        Self {
            num_classes,
            num_images,
            sets: vec![DetectionSet::default(); num_classes * num_images],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_images(&self) -> usize {
        self.num_images
    }

    /// Returns the detections of `class` in `image`.
    pub fn get(&self, class: usize, image: usize) -> Option<&DetectionSet> {
        if class >= self.num_classes || image >= self.num_images {
            return None;
        }
        self.sets.get(class * self.num_images + image)
    }

    /// Stores one image's per-class sets, indexed by class.
    ///
    /// `per_class` must have one entry per class; the background entry is
    /// discarded.
    pub fn insert_image(
        &mut self,
        image: usize,
        per_class: Vec<DetectionSet>,
    ) -> DetPostResult<()> {
        if image >= self.num_images {
            return Err(DetPostError::IndexOutOfBounds {
                index: image,
                len: self.num_images,
                context: "image",
            });
        }
        if per_class.len() != self.num_classes {
            return Err(DetPostError::ShapeMismatch {
                context: "per-class detection sets",
                expected: self.num_classes,
                got: per_class.len(),
            });
        }
        for (class, set) in per_class.into_iter().enumerate().skip(1) {
            self.sets[class * self.num_images + image] = set;
        }
        Ok(())
    }

    /// Total detections kept for `image` across all classes.
    pub fn image_count(&self, image: usize) -> usize {
        (0..self.num_classes)
            .filter_map(|c| self.get(c, image))
            .map(DetectionSet::len)
            .sum()
    }

    /// Whether any stored detection carries a keypoint box.
    pub fn has_keypoints(&self) -> bool {
        self.sets
            .iter()
            .any(|s| s.iter().any(|d| d.keypoints.is_some()))
    }

    /// Re-runs NMS over every stored set.
    pub fn apply_nms(&self, thresh: f32) -> Self {
        Self {
            num_classes: self.num_classes,
            num_images: self.num_images,
            sets: self.sets.iter().map(|s| s.nms(thresh)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{cap_per_image, DatasetResults, Detection, DetectionSet};
    use crate::bbox::BBox;

    fn det(score: f32) -> Detection {
        Detection::new(BBox::new(0.0, 0.0, 10.0, 10.0), score)
    }

    #[test]
    fn cap_uses_shared_threshold_across_classes() {
        let mut sets = vec![
            DetectionSet::default(),
            DetectionSet::new(vec![det(0.9), det(0.4)]),
            DetectionSet::new(vec![det(0.8), det(0.7), det(0.1)]),
        ];
        cap_per_image(&mut sets, 3);
        assert_eq!(sets[1].scores().collect::<Vec<_>>(), vec![0.9]);
        assert_eq!(sets[2].scores().collect::<Vec<_>>(), vec![0.8, 0.7]);
    }

    #[test]
    fn cap_breaks_exact_ties_from_last_class() {
        let mut sets = vec![
            DetectionSet::default(),
            DetectionSet::new(vec![det(0.5), det(0.5)]),
            DetectionSet::new(vec![det(0.5)]),
        ];
        cap_per_image(&mut sets, 2);
        assert_eq!(sets[1].len(), 2);
        assert!(sets[2].is_empty());
    }

    #[test]
    fn zero_cap_is_disabled() {
        let mut sets = vec![DetectionSet::new(vec![det(0.5); 4])];
        cap_per_image(&mut sets, 0);
        assert_eq!(sets[0].len(), 4);
    }

    #[test]
    fn insert_image_ignores_background() {
        let mut results = DatasetResults::new(2, 3);
        let per_class = vec![
            DetectionSet::new(vec![det(0.2)]),
            DetectionSet::new(vec![det(0.3)]),
        ];
        results.insert_image(1, per_class).unwrap();
        assert!(results.get(0, 1).unwrap().is_empty());
        assert_eq!(results.get(1, 1).unwrap().len(), 1);
        assert_eq!(results.image_count(1), 1);
        assert!(results.insert_image(3, vec![DetectionSet::default(); 2]).is_err());
        assert!(results.insert_image(0, vec![DetectionSet::default()]).is_err());
    }

    #[test]
    fn apply_nms_suppresses_within_each_slot() {
        let boxed = |x: f32, score: f32| Detection::new(BBox::new(x, 0.0, x + 9.0, 9.0), score);
        let mut results = DatasetResults::new(3, 2);
        results
            .insert_image(
                1,
                vec![
                    DetectionSet::default(),
                    DetectionSet::new(vec![boxed(0.0, 0.6), boxed(1.0, 0.9), boxed(40.0, 0.5)]),
                    DetectionSet::new(vec![boxed(0.0, 0.4)]),
                ],
            )
            .unwrap();

        let reduced = results.apply_nms(0.3);
        assert_eq!(reduced.num_classes(), 3);
        assert_eq!(reduced.num_images(), 2);
        assert!(reduced.get(0, 1).unwrap().is_empty());
        assert!(reduced.get(1, 0).unwrap().is_empty());
        assert_eq!(
            reduced.get(1, 1).unwrap().detections(),
            &[boxed(1.0, 0.9), boxed(40.0, 0.5)]
        );
        // Other classes never suppress each other.
        assert_eq!(reduced.get(2, 1).unwrap().len(), 1);
        assert_eq!(reduced.apply_nms(0.3), reduced);
    }
}
