//! Hash-based deduplication of projected RoIs.
//!
//! Distinct image RoIs often alias onto the same feature-map RoI after
//! projection. Each RoI row `[level, x1, y1, x2, y2]` is scaled by the dedup
//! resolution, rounded half-to-even, and folded into one `f64` key with
//! weights `1, 1e3, 1e6, 1e9, 1e12`. RoIs sharing a key are evaluated once.
//!
//! The key is a weighted sum, not an injective encoding: two different RoIs
//! whose sums coincide (for example when a rounded coordinate reaches 1000)
//! are merged without any signal. This trades exactness for speed and is kept
//! so results stay comparable with existing detection artifacts.

use crate::roi::ProjectedRoi;
use crate::tensor::Matrix;
use crate::trace::{trace_event, trace_span};
use crate::util::math::round_half_even;
use crate::util::{DetPostError, DetPostResult};

const HASH_WEIGHTS: [f64; 5] = [1.0, 1e3, 1e6, 1e9, 1e12];

/// Computes the dedup key of one projected RoI.
pub fn roi_hash(roi: &ProjectedRoi, resolution: f32) -> f64 {
    roi.to_row()
        .iter()
        .zip(HASH_WEIGHTS)
        .map(|(&v, w)| round_half_even(f64::from(v * resolution)) * w)
        .sum()
}

/// Mapping between the full RoI list and its unique subset.
#[derive(Clone, Debug, PartialEq)]
pub struct DedupPlan {
    keys: Vec<f64>,
    keep_index: Vec<usize>,
    inverse_index: Vec<usize>,
}

impl DedupPlan {
    /// Groups `rois` by key; returns `None` when `resolution <= 0` disables dedup.
    ///
    /// Unique keys are ordered ascending. `keep_index[u]` is the first RoI with
    /// key `u`, and `inverse_index[i]` is the unique slot of RoI `i`.
    pub fn build(rois: &[ProjectedRoi], resolution: f32) -> Option<Self> {
        if !(resolution > 0.0) {
            return None;
        }
        let _span = trace_span!("dedup", rois = rois.len()).entered();

        let hashes: Vec<f64> = rois.iter().map(|r| roi_hash(r, resolution)).collect();
        let mut order: Vec<usize> = (0..rois.len()).collect();
        order.sort_by(|&a, &b| hashes[a].total_cmp(&hashes[b]));

        let mut keys = Vec::new();
        let mut keep_index = Vec::new();
        let mut inverse_index = vec![0usize; rois.len()];
        for idx in order {
            let key = hashes[idx];
            if keys.last() != Some(&key) {
                keys.push(key);
                keep_index.push(idx);
            }
            inverse_index[idx] = keys.len() - 1;
        }

        trace_event!("dedup_unique", unique = keys.len());
        Some(Self {
            keys,
            keep_index,
            inverse_index,
        })
    }

    /// Sorted unique keys.
    pub fn keys(&self) -> &[f64] {
        &self.keys
    }

    /// Representative original index for each unique key.
    pub fn keep_index(&self) -> &[usize] {
        &self.keep_index
    }

    /// Unique slot for each original index.
    pub fn inverse_index(&self) -> &[usize] {
        &self.inverse_index
    }

    pub fn num_unique(&self) -> usize {
        self.keep_index.len()
    }

    pub fn num_original(&self) -> usize {
        self.inverse_index.len()
    }

    /// Selects the representative of every unique key from `items`.
    ///
    /// `items` must hold one entry per original RoI.
    pub fn reduce<T: Copy>(&self, items: &[T]) -> DetPostResult<Vec<T>> {
        if items.len() != self.num_original() {
            return Err(DetPostError::ShapeMismatch {
                context: "items to deduplicate",
                expected: self.num_original(),
                got: items.len(),
            });
        }
        Ok(self.keep_index.iter().map(|&i| items[i]).collect())
    }

    /// Restores one row per original RoI from per-unique-RoI rows.
    pub fn expand(&self, unique_rows: &Matrix) -> DetPostResult<Matrix> {
        unique_rows.expect_rows("deduplicated rows", self.num_unique())?;
        unique_rows.gather_rows(&self.inverse_index)
    }
}
