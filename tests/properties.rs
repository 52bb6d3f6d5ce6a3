//! Randomized checks of pipeline invariants.

use detpost::{
    bbox_transform_inv, cap_per_image, nms, BBox, DedupPlan, Detection, DetectionSet, Matrix,
    ProjectedRoi,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_box(rng: &mut StdRng, max: f32) -> BBox {
    let x1 = rng.random_range(0.0..max);
    let y1 = rng.random_range(0.0..max);
    let w = rng.random_range(1.0..max / 2.0);
    let h = rng.random_range(1.0..max / 2.0);
    BBox::new(x1, y1, x1 + w, y1 + h)
}

fn random_dets(rng: &mut StdRng, n: usize) -> Vec<Detection> {
    (0..n)
        .map(|_| {
            // Coarse scores so exact ties occur.
            let score = rng.random_range(0..20) as f32 / 20.0;
            Detection::new(random_box(rng, 200.0), score)
        })
        .collect()
}

#[test]
fn nms_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let dets = random_dets(&mut rng, 60);
        for thresh in [0.3, 0.5, 0.7] {
            let keep = nms(&dets, thresh);
            let kept: Vec<Detection> = keep.iter().map(|&i| dets[i]).collect();
            let again = nms(&kept, thresh);
            assert_eq!(again, (0..kept.len()).collect::<Vec<_>>());
        }
    }
}

#[test]
fn nms_output_is_score_descending_and_repeatable() {
    let mut rng = StdRng::seed_from_u64(11);
    let dets = random_dets(&mut rng, 80);
    let keep = nms(&dets, 0.4);
    assert!(keep.windows(2).all(|w| dets[w[0]].score >= dets[w[1]].score));
    assert_eq!(keep, nms(&dets, 0.4));
}

#[test]
fn score_filter_before_nms_keeps_same_survivors() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..30 {
        let dets = random_dets(&mut rng, 50);
        let thresh = 0.3;

        let mut after: Vec<Detection> = nms(&dets, 0.5)
            .into_iter()
            .map(|i| dets[i])
            .filter(|d| d.score > thresh)
            .collect();
        let filtered: Vec<Detection> = dets.iter().copied().filter(|d| d.score > thresh).collect();
        let mut before = DetectionSet::new(filtered).nms(0.5).detections().to_vec();

        let key = |d: &Detection| (d.bbox.to_array().map(f32::to_bits), d.score.to_bits());
        after.sort_by_key(key);
        before.sort_by_key(key);
        assert_eq!(after, before);
    }
}

#[test]
fn dedup_expand_restores_rows_and_shares_values() {
    let mut rng = StdRng::seed_from_u64(5);
    let rois: Vec<ProjectedRoi> = (0..200)
        .map(|_| ProjectedRoi {
            level: rng.random_range(0..2),
            bbox: BBox::new(
                rng.random_range(0..4) as f32 * 8.0,
                rng.random_range(0..4) as f32 * 8.0,
                64.0 + rng.random_range(0..4) as f32 * 8.0,
                64.0,
            ),
        })
        .collect();
    let resolution = 1.0 / 16.0;
    let plan = DedupPlan::build(&rois, resolution).unwrap();
    assert!(plan.num_unique() < rois.len());

    let unique: Vec<[f32; 2]> = (0..plan.num_unique())
        .map(|u| [u as f32, rng.random_range(0.0..1.0)])
        .collect();
    let restored = plan.expand(&Matrix::from_rows(&unique, 2).unwrap()).unwrap();
    assert_eq!(restored.rows(), rois.len());

    for i in 0..rois.len() {
        for j in 0..rois.len() {
            let same_key = detpost::dedup::roi_hash(&rois[i], resolution)
                == detpost::dedup::roi_hash(&rois[j], resolution);
            assert_eq!(same_key, restored.row(i) == restored.row(j));
        }
    }
}

#[test]
fn clipped_boxes_stay_inside_image() {
    let mut rng = StdRng::seed_from_u64(9);
    let (width, height) = (320usize, 240usize);
    let boxes: Vec<BBox> = (0..100).map(|_| random_box(&mut rng, 300.0)).collect();
    let classes = 4;
    let deltas: Vec<f32> = (0..boxes.len() * 4 * classes)
        .map(|_| rng.random_range(-2.0..2.0))
        .collect();
    let deltas = Matrix::new(deltas, boxes.len(), 4 * classes).unwrap();

    let mut pred = bbox_transform_inv(&boxes, &deltas).unwrap();
    pred.clip(width, height);
    for r in 0..pred.num_rois() {
        for b in pred.roi(r).unwrap() {
            assert!(0.0 <= b.x1 && b.x1 <= b.x2 && b.x2 <= width as f32 - 1.0);
            assert!(0.0 <= b.y1 && b.y1 <= b.y2 && b.y2 <= height as f32 - 1.0);
        }
    }
}

#[test]
fn cap_never_exceeds_limit() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..50 {
        let mut sets: Vec<DetectionSet> = (0..5)
            .map(|_| {
                let n = rng.random_range(0..30);
                DetectionSet::new(random_dets(&mut rng, n))
            })
            .collect();
        let cap = rng.random_range(1..40);
        let before: usize = sets.iter().map(DetectionSet::len).sum();
        cap_per_image(&mut sets, cap);
        let after: usize = sets.iter().map(DetectionSet::len).sum();
        assert!(after <= cap);
        assert_eq!(after, before.min(cap));
    }
}
